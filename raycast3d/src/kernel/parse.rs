//! Kernel source parser.
//!
//! ```text
//! kernel NAME channels N;
//! init { stmt* }
//! sample { stmt* }
//! finish { stmt* }
//!
//! stmt := let NAME = expr ; | NAME = expr ; | if expr { stmt* } | break ;
//! expr := sum (( < | > ) sum)?
//! sum  := product (( + | - ) product)*
//! product := unary (( * | / ) unary)*
//! unary := - unary | atom
//! atom := NUMBER | NAME ( expr, ... ) | NAME | ( expr )
//! ```

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{
        alpha1, alphanumeric1, char, digit1, multispace1, not_line_ending, satisfy,
    },
    combinator::{cut, map, map_res, not, opt, recognize, value},
    error::{context, VerboseError, VerboseErrorKind},
    multi::{many0, many0_count, separated_list0},
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use super::ast::{BinOp, Expr, ExprKind, KernelAst, Section, SectionKind, Stmt, StmtKind};
use crate::error::CompileError;

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Words that can not name a variable.
pub const RESERVED: [&str; 8] = [
    "kernel", "channels", "init", "sample", "finish", "let", "if", "break",
];

pub fn parse_kernel(source: &str) -> Result<KernelAst, CompileError> {
    match kernel(source) {
        Ok((rest, ast)) => {
            let (rest, _) = ws(rest).map_err(|e| to_compile_error(source, e))?;
            if rest.is_empty() {
                Ok(ast)
            } else {
                Err(CompileError::at(source, rest, "unexpected input after `finish`"))
            }
        }
        Err(e) => Err(to_compile_error(source, e)),
    }
}

fn to_compile_error(source: &str, err: nom::Err<VerboseError<&str>>) -> CompileError {
    match err {
        nom::Err::Incomplete(_) => {
            CompileError::at(source, "", "unexpected end of kernel source")
        }
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            // innermost entry points at the failing token, the outermost
            // context gives the reader something to look for
            let position = e.errors.first().map(|(rest, _)| *rest).unwrap_or("");
            let expected = e
                .errors
                .iter()
                .find_map(|(_, kind)| match kind {
                    VerboseErrorKind::Context(ctx) => Some(format!("expected {ctx}")),
                    _ => None,
                })
                .or_else(|| {
                    e.errors.first().map(|(_, kind)| match kind {
                        VerboseErrorKind::Char(c) => format!("expected `{c}`"),
                        VerboseErrorKind::Context(ctx) => format!("expected {ctx}"),
                        VerboseErrorKind::Nom(k) => format!("unexpected input ({k:?})"),
                    })
                })
                .unwrap_or_else(|| "syntax error".to_string());
            CompileError::at(source, position, expected)
        }
    }
}

/// Whitespace and `//` comments.
fn ws(i: &str) -> Res<()> {
    value(
        (),
        many0_count(alt((multispace1, preceded(tag("//"), not_line_ending)))),
    )(i)
}

fn token<'a, O, F>(mut inner: F) -> impl FnMut(&'a str) -> Res<'a, O>
where
    F: FnMut(&'a str) -> Res<'a, O>,
{
    move |i| {
        let (i, _) = ws(i)?;
        inner(i)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> Res<'a, &'a str> {
    token(terminated(tag(kw), not(satisfy(is_ident_char))))
}

fn identifier(i: &str) -> Res<&str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(i)
}

fn name(i: &str) -> Res<String> {
    context("a name", token(map(identifier, str::to_string)))(i)
}

fn kernel(i: &str) -> Res<KernelAst> {
    let (i, _) = context("`kernel`", keyword("kernel"))(i)?;
    let (i, (name, _, channels, _)) = cut(tuple((
        name,
        context("`channels`", keyword("channels")),
        context("a channel count", token(map_res(digit1, str::parse::<usize>))),
        token(char(';')),
    )))(i)?;
    let (i, init) = cut(section(SectionKind::Init))(i)?;
    let (i, sample) = cut(section(SectionKind::Sample))(i)?;
    let (i, finish) = cut(section(SectionKind::Finish))(i)?;
    Ok((
        i,
        KernelAst {
            name,
            channels,
            init,
            sample,
            finish,
        },
    ))
}

fn section<'a>(kind: SectionKind) -> impl FnMut(&'a str) -> Res<'a, Section> {
    move |i| {
        let (i, _) = ws(i)?;
        let at = i.len();
        let (i, _) = context(kind.keyword(), keyword(kind.keyword()))(i)?;
        let (i, body) = cut(block)(i)?;
        Ok((i, Section { kind, body, at }))
    }
}

fn block(i: &str) -> Res<Vec<Stmt>> {
    delimited(
        context("`{`", token(char('{'))),
        many0(statement),
        context("a statement or `}`", cut(token(char('}')))),
    )(i)
}

fn statement(i: &str) -> Res<Stmt> {
    let (i, _) = ws(i)?;
    let at = i.len();
    let (i, kind) = alt((let_stmt, if_stmt, break_stmt, assign_stmt))(i)?;
    Ok((i, Stmt { kind, at }))
}

fn let_stmt(i: &str) -> Res<StmtKind> {
    let (i, _) = keyword("let")(i)?;
    let (i, (name, _, e, _)) = cut(tuple((
        name,
        context("`=`", token(char('='))),
        expr,
        context("`;`", token(char(';'))),
    )))(i)?;
    Ok((i, StmtKind::Let(name, e)))
}

fn if_stmt(i: &str) -> Res<StmtKind> {
    let (i, _) = keyword("if")(i)?;
    let (i, (cond, body)) = cut(pair(expr, block))(i)?;
    Ok((i, StmtKind::If(cond, body)))
}

fn break_stmt(i: &str) -> Res<StmtKind> {
    let (i, _) = keyword("break")(i)?;
    let (i, _) = cut(context("`;`", token(char(';'))))(i)?;
    Ok((i, StmtKind::Break))
}

fn assign_stmt(i: &str) -> Res<StmtKind> {
    let (i, name) = token(map(identifier, str::to_string))(i)?;
    let (i, _) = token(char('='))(i)?;
    let (i, (e, _)) = cut(pair(expr, context("`;`", token(char(';')))))(i)?;
    Ok((i, StmtKind::Assign(name, e)))
}

fn expr(i: &str) -> Res<Expr> {
    let (i, lhs) = context("an expression", sum)(i)?;
    let (i, op) = opt(token(alt((
        value(BinOp::Lt, char('<')),
        value(BinOp::Gt, char('>')),
    ))))(i)?;
    match op {
        None => Ok((i, lhs)),
        Some(op) => {
            let (i, rhs) = cut(sum)(i)?;
            Ok((i, binary(op, lhs, rhs)))
        }
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    let at = lhs.at;
    Expr {
        kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)),
        at,
    }
}

fn sum(i: &str) -> Res<Expr> {
    let (mut i, mut acc) = product(i)?;
    loop {
        let (rest, op) = opt(token(alt((
            value(BinOp::Add, char('+')),
            value(BinOp::Sub, char('-')),
        ))))(i)?;
        let Some(op) = op else {
            return Ok((i, acc));
        };
        let (rest, rhs) = cut(product)(rest)?;
        acc = binary(op, acc, rhs);
        i = rest;
    }
}

fn product(i: &str) -> Res<Expr> {
    let (mut i, mut acc) = unary(i)?;
    loop {
        let (rest, op) = opt(token(alt((
            value(BinOp::Mul, char('*')),
            value(BinOp::Div, char('/')),
        ))))(i)?;
        let Some(op) = op else {
            return Ok((i, acc));
        };
        let (rest, rhs) = cut(unary)(rest)?;
        acc = binary(op, acc, rhs);
        i = rest;
    }
}

fn unary(i: &str) -> Res<Expr> {
    let (i, _) = ws(i)?;
    let at = i.len();
    match opt(char::<&str, VerboseError<&str>>('-'))(i)? {
        (rest, Some(_)) => {
            let (rest, inner) = cut(unary)(rest)?;
            Ok((
                rest,
                Expr {
                    kind: ExprKind::Neg(Box::new(inner)),
                    at,
                },
            ))
        }
        (_, None) => atom(i),
    }
}

fn atom(i: &str) -> Res<Expr> {
    let (i, _) = ws(i)?;
    let at = i.len();
    let (i, kind) = alt((number, call_or_var, parenthesized))(i)?;
    Ok((i, Expr { kind, at }))
}

fn number(i: &str) -> Res<ExprKind> {
    // sign is handled by `unary`
    let (i, _) = not(alt((char::<&str, VerboseError<&str>>('+'), char('-'))))(i)?;
    map(map_res(recognize_float, str::parse::<f32>), ExprKind::Number)(i)
}

fn call_or_var(i: &str) -> Res<ExprKind> {
    let (i, name) = map(identifier, str::to_string)(i)?;
    let (i, args) = opt(preceded(
        token(char('(')),
        cut(terminated(
            separated_list0(token(char(',')), expr),
            context("`)`", token(char(')'))),
        )),
    ))(i)?;
    Ok(match args {
        Some(args) => (i, ExprKind::Call(name, args)),
        None => (i, ExprKind::Var(name)),
    })
}

fn parenthesized(i: &str) -> Res<ExprKind> {
    map(
        delimited(char('('), cut(expr), context("`)`", cut(token(char(')'))))),
        |e| e.kind,
    )(i)
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse_expr(src: &str) -> Expr {
        let (rest, e) = expr(src).unwrap();
        assert!(rest.trim().is_empty(), "left over: {rest:?}");
        e
    }

    fn kinds(e: &Expr) -> String {
        match &e.kind {
            ExprKind::Number(v) => format!("{v}"),
            ExprKind::Var(n) => n.clone(),
            ExprKind::Neg(inner) => format!("(-{})", kinds(inner)),
            ExprKind::Binary(op, l, r) => format!("({} {:?} {})", kinds(l), op, kinds(r)),
            ExprKind::Call(n, args) => format!(
                "{n}[{}]",
                args.iter().map(kinds).collect::<Vec<_>>().join(",")
            ),
        }
    }

    #[test]
    fn precedence() {
        let e = parse_expr("a + b * 2.5 - -c");
        assert_eq!(kinds(&e), "((a Add (b Mul 2.5)) Sub (-c))");

        let e = parse_expr("1 - t0 * x > termination()");
        assert_eq!(kinds(&e), "((1 Sub (t0 Mul x)) Gt termination[])");
    }

    #[test]
    fn calls_and_parentheses() {
        let e = parse_expr("clamp((a + 1) / 2, 0.0, 1e-6)");
        assert_eq!(kinds(&e), "clamp[((a Add 1) Div 2),0,0.000001]");
    }

    #[test]
    fn whole_kernel() {
        let src = "// test kernel\n\
                   kernel k channels 2;\n\
                   init { let m = 0.0; }\n\
                   sample {\n    m = max(m, sample(1)); // running max\n    if m > 0.5 { break; }\n}\n\
                   finish { let out = vec3(m); }\n";
        let ast = parse_kernel(src).unwrap();
        assert_eq!(ast.name, "k");
        assert_eq!(ast.channels, 2);
        assert_eq!(ast.init.body.len(), 1);
        assert_eq!(ast.sample.body.len(), 2);
        assert!(matches!(ast.sample.body[1].kind, StmtKind::If(_, ref b) if b[0].kind == StmtKind::Break));
    }

    #[test]
    fn keyword_prefix_is_a_name() {
        let (_, s) = statement("letter = 1;").unwrap();
        assert!(matches!(s.kind, StmtKind::Assign(ref n, _) if n == "letter"));
    }

    #[test]
    fn reports_position() {
        let src = "kernel k channels 1;\ninit { }\nsample {\n  let x = 1 +;\n}\nfinish { }";
        let err = parse_kernel(src).unwrap_err();
        assert_eq!(err.line, 4);
        assert_eq!(err.column, 14);
    }

    #[test]
    fn missing_section() {
        let err = parse_kernel("kernel k channels 1; init { } finish { }").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("sample"), "{}", err.message);
    }

    #[test]
    fn trailing_garbage() {
        let err = parse_kernel("kernel k channels 0; init {} sample {} finish {} extra").unwrap_err();
        assert_eq!(err.column, 50);
    }
}
