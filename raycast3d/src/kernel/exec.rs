//! Program interpreter, one ray at a time.

use nalgebra::Vector3;

use super::compile::{Arith, ChannelScalar, Instr, Program, SExpr, VExpr};
use crate::{
    color::{self, RGB},
    device::Uniforms,
};

/// Per sample inputs, supplied by the device for the current ray position.
pub trait Samples {
    fn sample(&mut self, channel: usize) -> f32;
    fn gradient(&mut self, channel: usize) -> Vector3<f32>;
    /// Ray position lies inside the channel's box and depth interval.
    fn visible(&self, channel: usize) -> bool;
}

/// `init` and `finish` never read samples (rejected by the checker).
struct NoSamples;

impl Samples for NoSamples {
    fn sample(&mut self, _channel: usize) -> f32 {
        0.0
    }

    fn gradient(&mut self, _channel: usize) -> Vector3<f32> {
        Vector3::zeros()
    }

    fn visible(&self, _channel: usize) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Break,
}

/// Variable storage for one program run.
///
/// Reused between pixels, [`Machine::begin`] resets it.
pub struct Machine<'p> {
    program: &'p Program,
    uniforms: &'p Uniforms,
    scalars: Vec<f32>,
    vectors: Vec<Vector3<f32>>,
}

impl<'p> Machine<'p> {
    pub fn new(program: &'p Program, uniforms: &'p Uniforms) -> Self {
        Self {
            program,
            uniforms,
            scalars: vec![0.0; program.n_scalars],
            vectors: vec![Vector3::zeros(); program.n_vectors],
        }
    }

    /// Reset variables and run `init`.
    pub fn begin(&mut self) {
        self.scalars.iter_mut().for_each(|v| *v = 0.0);
        self.vectors.iter_mut().for_each(|v| *v = Vector3::zeros());
        let program = self.program;
        self.run(&program.init, &mut NoSamples);
    }

    /// Run `sample` for one ray position.
    pub fn step<S: Samples>(&mut self, samples: &mut S) -> Flow {
        let program = self.program;
        self.run(&program.sample, samples)
    }

    /// Run `finish`, returns the pixel colour.
    pub fn finish(&mut self) -> RGB {
        let program = self.program;
        self.run(&program.finish, &mut NoSamples);
        self.vectors
            .get(program.out)
            .copied()
            .unwrap_or_else(color::zero)
    }

    fn run<S: Samples>(&mut self, code: &[Instr], samples: &mut S) -> Flow {
        for instr in code {
            match instr {
                Instr::SetScalar(slot, e) => {
                    let v = self.scalar(e, samples);
                    self.scalars[*slot] = v;
                }
                Instr::SetVec(slot, e) => {
                    let v = self.vector(e, samples);
                    self.vectors[*slot] = v;
                }
                Instr::If(cond, body) => {
                    if self.scalar(cond, samples) != 0.0 && self.run(body, samples) == Flow::Break {
                        return Flow::Break;
                    }
                }
                Instr::Break => return Flow::Break,
            }
        }
        Flow::Continue
    }

    fn scalar<S: Samples>(&self, e: &SExpr, s: &mut S) -> f32 {
        let u = self.uniforms;
        match e {
            SExpr::Const(v) => *v,
            SExpr::Slot(slot) => self.scalars[*slot],
            SExpr::Neg(a) => -self.scalar(a, s),
            SExpr::Arith(op, a, b) => arith(*op, self.scalar(a, s), self.scalar(b, s)),
            SExpr::Less(a, b) => {
                if self.scalar(a, s) < self.scalar(b, s) {
                    1.0
                } else {
                    0.0
                }
            }
            SExpr::Min(a, b) => self.scalar(a, s).min(self.scalar(b, s)),
            SExpr::Max(a, b) => self.scalar(a, s).max(self.scalar(b, s)),
            SExpr::Clamp(x, lo, hi) => {
                let (x, lo, hi) = (self.scalar(x, s), self.scalar(lo, s), self.scalar(hi, s));
                x.max(lo).min(hi)
            }
            SExpr::Pow(a, b) => self.scalar(a, s).powf(self.scalar(b, s)),
            SExpr::Dot(a, b) => self.vector(a, s).dot(&self.vector(b, s)),
            SExpr::Length(a) => self.vector(a, s).norm(),
            SExpr::Sample(c) => s.sample(*c),
            SExpr::Visible(c) => {
                if s.visible(*c) {
                    1.0
                } else {
                    0.0
                }
            }
            SExpr::TfColor(c, v) => u.channels[*c].intensity.map(self.scalar(v, s)),
            SExpr::TfAlpha(c, v) => u.channels[*c].alpha.map(self.scalar(v, s)),
            SExpr::Channel(which, c) => {
                let ch = &u.channels[*c];
                match which {
                    ChannelScalar::Weight => ch.weight,
                    ChannelScalar::KObject => ch.light.k_object,
                    ChannelScalar::KDiffuse => ch.light.k_diffuse,
                    ChannelScalar::KSpecular => ch.light.k_specular,
                    ChannelScalar::Shininess => ch.light.shininess,
                }
            }
            SExpr::Termination => u.termination,
        }
    }

    fn vector<S: Samples>(&self, e: &VExpr, s: &mut S) -> Vector3<f32> {
        let u = self.uniforms;
        match e {
            VExpr::Slot(slot) => self.vectors[*slot],
            VExpr::Neg(a) => -self.vector(a, s),
            VExpr::Arith(op, a, b) => {
                let (a, b) = (self.vector(a, s), self.vector(b, s));
                a.zip_map(&b, |x, y| arith(*op, x, y))
            }
            VExpr::ArithSV(op, a, b) => {
                let (a, b) = (self.scalar(a, s), self.vector(b, s));
                b.map(|y| arith(*op, a, y))
            }
            VExpr::ArithVS(op, a, b) => {
                let (a, b) = (self.vector(a, s), self.scalar(b, s));
                a.map(|x| arith(*op, x, b))
            }
            VExpr::Splat(a) => color::mono(self.scalar(a, s)),
            VExpr::Make(x, y, z) => {
                Vector3::new(self.scalar(x, s), self.scalar(y, s), self.scalar(z, s))
            }
            VExpr::Min(a, b) => self.vector(a, s).inf(&self.vector(b, s)),
            VExpr::Max(a, b) => self.vector(a, s).sup(&self.vector(b, s)),
            VExpr::Clamp(x, lo, hi) => {
                let (x, lo, hi) = (self.vector(x, s), self.scalar(lo, s), self.scalar(hi, s));
                x.map(|v| v.max(lo).min(hi))
            }
            VExpr::Normalize(a) => {
                let v = self.vector(a, s);
                let n = v.norm();
                if n > 0.0 {
                    v / n
                } else {
                    Vector3::zeros()
                }
            }
            VExpr::Gradient(c) => s.gradient(*c),
            VExpr::Color(c) => u.channels[*c].color,
            VExpr::Background => u.background,
            VExpr::LightDir => u.light_dir,
        }
    }
}

fn arith(op: Arith, a: f32, b: f32) -> f32 {
    match op {
        Arith::Add => a + b,
        Arith::Sub => a - b,
        Arith::Mul => a * b,
        Arith::Div => a / b,
    }
}
