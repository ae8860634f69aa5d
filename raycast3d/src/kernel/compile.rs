//! Type checking and slot resolution.
//!
//! Output is a typed tree: scalar and vector expressions are separate
//! enums, so evaluation never has to check types.

use std::collections::HashMap;

use super::{
    ast::{BinOp, Expr, ExprKind, KernelAst, Section, SectionKind, Stmt, StmtKind},
    parse::{parse_kernel, RESERVED},
};
use crate::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Scalar,
    Vec3,
}

impl Type {
    fn name(&self) -> &'static str {
        match self {
            Type::Scalar => "scalar",
            Type::Vec3 => "vec3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arith {
    Add,
    Sub,
    Mul,
    Div,
}

/// Per channel scalar uniforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelScalar {
    Weight,
    KObject,
    KDiffuse,
    KSpecular,
    Shininess,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SExpr {
    Const(f32),
    Slot(usize),
    Neg(Box<SExpr>),
    Arith(Arith, Box<SExpr>, Box<SExpr>),
    Less(Box<SExpr>, Box<SExpr>),
    Min(Box<SExpr>, Box<SExpr>),
    Max(Box<SExpr>, Box<SExpr>),
    Clamp(Box<SExpr>, Box<SExpr>, Box<SExpr>),
    Pow(Box<SExpr>, Box<SExpr>),
    Dot(Box<VExpr>, Box<VExpr>),
    Length(Box<VExpr>),
    Sample(usize),
    Visible(usize),
    TfColor(usize, Box<SExpr>),
    TfAlpha(usize, Box<SExpr>),
    Channel(ChannelScalar, usize),
    Termination,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VExpr {
    Slot(usize),
    Neg(Box<VExpr>),
    Arith(Arith, Box<VExpr>, Box<VExpr>),
    /// scalar `op` vector
    ArithSV(Arith, Box<SExpr>, Box<VExpr>),
    /// vector `op` scalar
    ArithVS(Arith, Box<VExpr>, Box<SExpr>),
    Splat(Box<SExpr>),
    Make(Box<SExpr>, Box<SExpr>, Box<SExpr>),
    Min(Box<VExpr>, Box<VExpr>),
    Max(Box<VExpr>, Box<VExpr>),
    Clamp(Box<VExpr>, Box<SExpr>, Box<SExpr>),
    Normalize(Box<VExpr>),
    Gradient(usize),
    Color(usize),
    Background,
    LightDir,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    SetScalar(usize, SExpr),
    SetVec(usize, VExpr),
    If(SExpr, Vec<Instr>),
    Break,
}

/// Checked kernel, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub(crate) name: String,
    pub(crate) n_channels: usize,
    pub(crate) n_scalars: usize,
    pub(crate) n_vectors: usize,
    pub(crate) init: Vec<Instr>,
    pub(crate) sample: Vec<Instr>,
    pub(crate) finish: Vec<Instr>,
    /// Vector slot holding the pixel colour.
    pub(crate) out: usize,
}

impl Program {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }
}

/// Parse and check `source`.
pub fn compile(source: &str) -> Result<Program, CompileError> {
    let ast = parse_kernel(source)?;
    Checker::new(source, ast.channels).check(ast)
}

enum Typed {
    S(SExpr),
    V(VExpr),
}

impl Typed {
    fn ty(&self) -> Type {
        match self {
            Typed::S(_) => Type::Scalar,
            Typed::V(_) => Type::Vec3,
        }
    }
}

struct Checker<'s> {
    source: &'s str,
    n_channels: usize,
    vars: HashMap<String, (Type, usize)>,
    n_scalars: usize,
    n_vectors: usize,
    section: SectionKind,
}

impl<'s> Checker<'s> {
    fn new(source: &'s str, n_channels: usize) -> Self {
        Self {
            source,
            n_channels,
            vars: HashMap::new(),
            n_scalars: 0,
            n_vectors: 0,
            section: SectionKind::Init,
        }
    }

    fn error(&self, at: usize, message: impl Into<String>) -> CompileError {
        let offset = self.source.len().saturating_sub(at);
        CompileError::at(self.source, &self.source[offset..], message)
    }

    fn check(mut self, ast: KernelAst) -> Result<Program, CompileError> {
        let init = self.section(&ast.init)?;
        let sample = self.section(&ast.sample)?;
        let finish = self.section(&ast.finish)?;

        let out = match self.vars.get("out") {
            Some((Type::Vec3, slot)) => *slot,
            Some((Type::Scalar, _)) => {
                return Err(self.error(ast.finish.at, "`out` must be a vec3"));
            }
            None => {
                return Err(self.error(ast.finish.at, "`finish` must declare `out`"));
            }
        };

        Ok(Program {
            name: ast.name,
            n_channels: ast.channels,
            n_scalars: self.n_scalars,
            n_vectors: self.n_vectors,
            init,
            sample,
            finish,
            out,
        })
    }

    fn section(&mut self, section: &Section) -> Result<Vec<Instr>, CompileError> {
        self.section = section.kind;
        self.block(&section.body, false)
    }

    fn block(&mut self, body: &[Stmt], nested: bool) -> Result<Vec<Instr>, CompileError> {
        body.iter().map(|s| self.statement(s, nested)).collect()
    }

    fn statement(&mut self, stmt: &Stmt, nested: bool) -> Result<Instr, CompileError> {
        match &stmt.kind {
            StmtKind::Let(name, e) => {
                if nested {
                    return Err(self.error(stmt.at, "`let` is not allowed inside `if`"));
                }
                if RESERVED.contains(&name.as_str()) {
                    return Err(self.error(stmt.at, format!("`{name}` is a reserved word")));
                }
                if self.vars.contains_key(name) {
                    return Err(self.error(stmt.at, format!("`{name}` is already declared")));
                }
                if name == "out" && self.section != SectionKind::Finish {
                    return Err(self.error(stmt.at, "`out` can only be declared in `finish`"));
                }
                let value = self.expr(e)?;
                let ty = value.ty();
                let slot = match ty {
                    Type::Scalar => {
                        self.n_scalars += 1;
                        self.n_scalars - 1
                    }
                    Type::Vec3 => {
                        self.n_vectors += 1;
                        self.n_vectors - 1
                    }
                };
                self.vars.insert(name.clone(), (ty, slot));
                Ok(set(slot, value))
            }
            StmtKind::Assign(name, e) => {
                let (ty, slot) = *self
                    .vars
                    .get(name)
                    .ok_or_else(|| self.error(stmt.at, format!("`{name}` is not declared")))?;
                let value = self.expr(e)?;
                if value.ty() != ty {
                    return Err(self.error(
                        e.at,
                        format!("cannot assign {} to {} `{name}`", value.ty().name(), ty.name()),
                    ));
                }
                Ok(set(slot, value))
            }
            StmtKind::If(cond, body) => {
                let cond = self.scalar(cond)?;
                let body = self.block(body, true)?;
                Ok(Instr::If(cond, body))
            }
            StmtKind::Break => {
                if self.section != SectionKind::Sample {
                    return Err(self.error(stmt.at, "`break` is only allowed in `sample`"));
                }
                Ok(Instr::Break)
            }
        }
    }

    fn scalar(&self, e: &Expr) -> Result<SExpr, CompileError> {
        match self.expr(e)? {
            Typed::S(s) => Ok(s),
            Typed::V(_) => Err(self.error(e.at, "expected a scalar, found vec3")),
        }
    }

    fn vector(&self, e: &Expr) -> Result<VExpr, CompileError> {
        match self.expr(e)? {
            Typed::V(v) => Ok(v),
            Typed::S(_) => Err(self.error(e.at, "expected a vec3, found scalar")),
        }
    }

    fn expr(&self, e: &Expr) -> Result<Typed, CompileError> {
        match &e.kind {
            ExprKind::Number(v) => Ok(Typed::S(SExpr::Const(*v))),
            ExprKind::Var(name) => match self.vars.get(name) {
                Some((Type::Scalar, slot)) => Ok(Typed::S(SExpr::Slot(*slot))),
                Some((Type::Vec3, slot)) => Ok(Typed::V(VExpr::Slot(*slot))),
                None => Err(self.error(e.at, format!("`{name}` is not declared"))),
            },
            ExprKind::Neg(inner) => Ok(match self.expr(inner)? {
                Typed::S(s) => Typed::S(SExpr::Neg(Box::new(s))),
                Typed::V(v) => Typed::V(VExpr::Neg(Box::new(v))),
            }),
            ExprKind::Binary(op, lhs, rhs) => {
                let l = self.expr(lhs)?;
                let r = self.expr(rhs)?;
                let arith = match op {
                    BinOp::Add => Arith::Add,
                    BinOp::Sub => Arith::Sub,
                    BinOp::Mul => Arith::Mul,
                    BinOp::Div => Arith::Div,
                    BinOp::Lt | BinOp::Gt => {
                        let (Typed::S(l), Typed::S(r)) = (l, r) else {
                            return Err(self.error(e.at, "comparison needs scalar operands"));
                        };
                        let (l, r) = if *op == BinOp::Lt { (l, r) } else { (r, l) };
                        return Ok(Typed::S(SExpr::Less(Box::new(l), Box::new(r))));
                    }
                };
                Ok(match (l, r) {
                    (Typed::S(l), Typed::S(r)) => Typed::S(SExpr::Arith(arith, Box::new(l), Box::new(r))),
                    (Typed::V(l), Typed::V(r)) => Typed::V(VExpr::Arith(arith, Box::new(l), Box::new(r))),
                    (Typed::S(l), Typed::V(r)) => Typed::V(VExpr::ArithSV(arith, Box::new(l), Box::new(r))),
                    (Typed::V(l), Typed::S(r)) => Typed::V(VExpr::ArithVS(arith, Box::new(l), Box::new(r))),
                })
            }
            ExprKind::Call(name, args) => self.call(e, name, args),
        }
    }

    fn arity(&self, e: &Expr, name: &str, args: &[Expr], n: usize) -> Result<(), CompileError> {
        if args.len() != n {
            return Err(self.error(
                e.at,
                format!("`{name}` takes {n} argument(s), {} given", args.len()),
            ));
        }
        Ok(())
    }

    /// Channel arguments are integer literals below the declared count.
    fn channel(&self, arg: &Expr) -> Result<usize, CompileError> {
        match arg.kind {
            ExprKind::Number(v) if v >= 0.0 && v.fract() == 0.0 => {
                let c = v as usize;
                if c < self.n_channels {
                    Ok(c)
                } else {
                    Err(self.error(
                        arg.at,
                        format!("channel {c} out of range, kernel has {}", self.n_channels),
                    ))
                }
            }
            _ => Err(self.error(arg.at, "channel must be an integer literal")),
        }
    }

    fn per_sample(&self, e: &Expr, name: &str) -> Result<(), CompileError> {
        if self.section != SectionKind::Sample {
            return Err(self.error(e.at, format!("`{name}` is only available in `sample`")));
        }
        Ok(())
    }

    fn call(&self, e: &Expr, name: &str, args: &[Expr]) -> Result<Typed, CompileError> {
        let typed = match name {
            "vec3" => match args.len() {
                1 => Typed::V(VExpr::Splat(Box::new(self.scalar(&args[0])?))),
                3 => Typed::V(VExpr::Make(
                    Box::new(self.scalar(&args[0])?),
                    Box::new(self.scalar(&args[1])?),
                    Box::new(self.scalar(&args[2])?),
                )),
                n => {
                    return Err(self.error(e.at, format!("`vec3` takes 1 or 3 arguments, {n} given")))
                }
            },
            "min" | "max" => {
                self.arity(e, name, args, 2)?;
                let is_min = name == "min";
                match (self.expr(&args[0])?, self.expr(&args[1])?) {
                    (Typed::S(l), Typed::S(r)) => Typed::S(if is_min {
                        SExpr::Min(Box::new(l), Box::new(r))
                    } else {
                        SExpr::Max(Box::new(l), Box::new(r))
                    }),
                    (l, r) => {
                        let (l, r) = (splat(l), splat(r));
                        Typed::V(if is_min {
                            VExpr::Min(Box::new(l), Box::new(r))
                        } else {
                            VExpr::Max(Box::new(l), Box::new(r))
                        })
                    }
                }
            }
            "clamp" => {
                self.arity(e, name, args, 3)?;
                let lo = Box::new(self.scalar(&args[1])?);
                let hi = Box::new(self.scalar(&args[2])?);
                match self.expr(&args[0])? {
                    Typed::S(x) => Typed::S(SExpr::Clamp(Box::new(x), lo, hi)),
                    Typed::V(x) => Typed::V(VExpr::Clamp(Box::new(x), lo, hi)),
                }
            }
            "pow" => {
                self.arity(e, name, args, 2)?;
                Typed::S(SExpr::Pow(Box::new(self.scalar(&args[0])?), Box::new(self.scalar(&args[1])?)))
            }
            "dot" => {
                self.arity(e, name, args, 2)?;
                Typed::S(SExpr::Dot(Box::new(self.vector(&args[0])?), Box::new(self.vector(&args[1])?)))
            }
            "normalize" => {
                self.arity(e, name, args, 1)?;
                Typed::V(VExpr::Normalize(Box::new(self.vector(&args[0])?)))
            }
            "length" => {
                self.arity(e, name, args, 1)?;
                Typed::S(SExpr::Length(Box::new(self.vector(&args[0])?)))
            }
            "sample" | "gradient" | "visible" => {
                self.arity(e, name, args, 1)?;
                self.per_sample(e, name)?;
                let c = self.channel(&args[0])?;
                match name {
                    "sample" => Typed::S(SExpr::Sample(c)),
                    "gradient" => Typed::V(VExpr::Gradient(c)),
                    _ => Typed::S(SExpr::Visible(c)),
                }
            }
            "tf_color" | "tf_alpha" => {
                self.arity(e, name, args, 2)?;
                let c = self.channel(&args[0])?;
                let v = Box::new(self.scalar(&args[1])?);
                Typed::S(if name == "tf_color" {
                    SExpr::TfColor(c, v)
                } else {
                    SExpr::TfAlpha(c, v)
                })
            }
            "color" => {
                self.arity(e, name, args, 1)?;
                Typed::V(VExpr::Color(self.channel(&args[0])?))
            }
            "weight" | "k_object" | "k_diffuse" | "k_specular" | "shininess" => {
                self.arity(e, name, args, 1)?;
                let which = match name {
                    "weight" => ChannelScalar::Weight,
                    "k_object" => ChannelScalar::KObject,
                    "k_diffuse" => ChannelScalar::KDiffuse,
                    "k_specular" => ChannelScalar::KSpecular,
                    _ => ChannelScalar::Shininess,
                };
                Typed::S(SExpr::Channel(which, self.channel(&args[0])?))
            }
            "background" => {
                self.arity(e, name, args, 0)?;
                Typed::V(VExpr::Background)
            }
            "light_dir" => {
                self.arity(e, name, args, 0)?;
                Typed::V(VExpr::LightDir)
            }
            "termination" => {
                self.arity(e, name, args, 0)?;
                Typed::S(SExpr::Termination)
            }
            _ => return Err(self.error(e.at, format!("unknown function `{name}`"))),
        };
        Ok(typed)
    }
}

fn splat(t: Typed) -> VExpr {
    match t {
        Typed::S(s) => VExpr::Splat(Box::new(s)),
        Typed::V(v) => v,
    }
}

fn set(slot: usize, value: Typed) -> Instr {
    match value {
        Typed::S(s) => Instr::SetScalar(slot, s),
        Typed::V(v) => Instr::SetVec(slot, v),
    }
}
