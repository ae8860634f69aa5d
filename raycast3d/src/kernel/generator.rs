//! Kernel source generation.
//!
//! The generated source depends only on the channel count, the per channel
//! light flags and the compositing algorithm. Every other setting is a
//! uniform and can change without recompiling.

use crate::state::{CompositingAlgorithm, ProgramKey};

/// Below this summed weighted alpha a sample adds no colour.
const EPSILON: &str = "0.000001";

/// Kernel source for `key`. Pure and deterministic.
pub fn generate(key: &ProgramKey) -> String {
    let n = key.n_channels();
    let mut g = Generator::default();

    let lights: Vec<_> = key
        .use_light
        .iter()
        .map(|&l| if l { '1' } else { '0' })
        .collect();
    g.line(&format!(
        "// {} | {} channel(s) | light {}",
        key.algorithm.name(),
        n,
        lights.iter().collect::<String>()
    ));
    g.line(&format!("kernel {} channels {};", key.algorithm.name(), n));

    match key.algorithm {
        CompositingAlgorithm::IndependentTransparency => independent(&mut g, &key.use_light),
        CompositingAlgorithm::CombinedTransparency => combined(&mut g, &key.use_light),
        CompositingAlgorithm::MaximumIntensity => maximum(&mut g, &key.use_light),
    }
    g.source
}

#[derive(Default)]
struct Generator {
    source: String,
    indent: usize,
}

impl Generator {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.source.push_str("    ");
        }
        self.source.push_str(text);
        self.source.push('\n');
    }

    fn open(&mut self, section: &str) {
        self.line(&format!("{section} {{"));
        self.indent += 1;
    }

    fn close(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line("}");
    }

    /// `let v{c}`, `i{c}` and `a{c}`: value, transfer mapped (and shaded)
    /// intensity and alpha of channel `c` at the current sample.
    fn channel_sample(&mut self, c: usize, use_light: bool) {
        self.line(&format!("let v{c} = sample({c});"));
        self.line(&format!("let i{c} = tf_color({c}, v{c});"));
        self.line(&format!("let a{c} = tf_alpha({c}, v{c}) * visible({c});"));
        if use_light {
            self.line(&format!("let n{c} = normalize(-gradient({c}));"));
            self.line(&format!("let d{c} = max(dot(n{c}, light_dir()), 0.0);"));
            self.line(&format!(
                "i{c} = i{c} * (k_object({c}) + k_diffuse({c}) * d{c}) + k_specular({c}) * pow(d{c}, shininess({c}));"
            ));
        }
    }
}

fn join(n: usize, sep: &str, term: impl Fn(usize) -> String) -> String {
    (0..n).map(term).collect::<Vec<_>>().join(sep)
}

/// `min(x0, min(x1, ...))`
fn nested(n: usize, func: &str, var: &str) -> String {
    (0..n)
        .rev()
        .map(|c| format!("{var}{c}"))
        .reduce(|acc, x| format!("{func}({x}, {acc})"))
        .unwrap_or_else(|| "0.0".to_string())
}

fn independent(g: &mut Generator, use_light: &[bool]) {
    let n = use_light.len();

    g.open("init");
    for c in 0..n {
        g.line(&format!("let c{c} = vec3(0.0);"));
        g.line(&format!("let t{c} = 0.0;"));
    }
    g.close();

    g.open("sample");
    for (c, &light) in use_light.iter().enumerate() {
        g.channel_sample(c, light);
        g.line(&format!(
            "c{c} = c{c} + (1.0 - t{c}) * a{c} * i{c} * color({c});"
        ));
        g.line(&format!("t{c} = t{c} + (1.0 - t{c}) * a{c};"));
    }
    if n > 0 {
        g.line(&format!("if {} > termination() {{ break; }}", nested(n, "min", "t")));
    }
    g.close();

    g.open("finish");
    let mut terms: Vec<String> = (0..n).map(|c| format!("weight({c}) * c{c}")).collect();
    let transmittance = join(n, " * ", |c| format!("(1.0 - t{c})"));
    terms.push(if n > 0 {
        format!("{transmittance} * background()")
    } else {
        "background()".to_string()
    });
    g.line(&format!("let out = {};", terms.join(" + ")));
    g.close();
}

fn combined(g: &mut Generator, use_light: &[bool]) {
    let n = use_light.len();

    g.open("init");
    g.line("let acc = vec3(0.0);");
    g.line("let t = 0.0;");
    g.close();

    g.open("sample");
    if n > 0 {
        for (c, &light) in use_light.iter().enumerate() {
            g.channel_sample(c, light);
            g.line(&format!("let wa{c} = clamp(weight({c}) * a{c}, 0.0, 1.0);"));
        }
        g.line(&format!(
            "let sa = 1.0 - {};",
            join(n, " * ", |c| format!("(1.0 - wa{c})"))
        ));
        g.line(&format!("let sw = {};", join(n, " + ", |c| format!("wa{c}"))));
        g.line(&format!(
            "let sc = ({}) / max(sw, {EPSILON});",
            join(n, " + ", |c| format!("wa{c} * i{c} * color({c})"))
        ));
        g.line("acc = acc + (1.0 - t) * sa * sc;");
        g.line("t = t + (1.0 - t) * sa;");
        g.line("if t > termination() { break; }");
    }
    g.close();

    g.open("finish");
    g.line("let out = acc + (1.0 - t) * background();");
    g.close();
}

fn maximum(g: &mut Generator, use_light: &[bool]) {
    let n = use_light.len();

    g.open("init");
    for c in 0..n {
        g.line(&format!("let m{c} = 0.0;"));
    }
    g.close();

    g.open("sample");
    for (c, &light) in use_light.iter().enumerate() {
        g.channel_sample(c, light);
        g.line(&format!("m{c} = max(m{c}, i{c} * visible({c}));"));
    }
    g.close();

    g.open("finish");
    let mut terms: Vec<String> = (0..n)
        .map(|c| format!("weight({c}) * m{c} * color({c})"))
        .collect();
    terms.push(if n > 0 {
        format!(
            "(1.0 - clamp({}, 0.0, 1.0)) * background()",
            nested(n, "max", "m")
        )
    } else {
        "background()".to_string()
    });
    g.line(&format!("let out = {};", terms.join(" + ")));
    g.close();
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kernel::compile;

    fn key(use_light: &[bool], algorithm: CompositingAlgorithm) -> ProgramKey {
        ProgramKey {
            use_light: use_light.to_vec(),
            algorithm,
        }
    }

    #[test]
    fn every_shape_compiles() {
        let lights: [&[bool]; 5] = [&[], &[false], &[true], &[true, false], &[false, true, true]];
        for algorithm in CompositingAlgorithm::ALL {
            for l in lights {
                let src = generate(&key(l, algorithm));
                let program = compile(&src).unwrap_or_else(|e| panic!("{e}\n{src}"));
                assert_eq!(program.n_channels(), l.len());
                assert_eq!(program.name(), algorithm.name());
            }
        }
    }

    #[test]
    fn deterministic() {
        let k = key(&[true, false], CompositingAlgorithm::CombinedTransparency);
        assert_eq!(generate(&k), generate(&k.clone()));
    }

    #[test]
    fn light_flags_change_source() {
        let unlit = generate(&key(&[false, false], CompositingAlgorithm::IndependentTransparency));
        let lit = generate(&key(&[false, true], CompositingAlgorithm::IndependentTransparency));
        assert_ne!(unlit, lit);
        assert!(!unlit.contains("gradient("));
        assert!(lit.contains("gradient(1)"));
        assert!(!lit.contains("gradient(0)"));
    }

    #[test]
    fn early_termination_over_all_channels() {
        let src = generate(&key(&[false; 3], CompositingAlgorithm::IndependentTransparency));
        assert!(src.contains("if min(t0, min(t1, t2)) > termination() { break; }"));

        let mip = generate(&key(&[false; 3], CompositingAlgorithm::MaximumIntensity));
        assert!(!mip.contains("break"));
    }
}
