//! Multi-controlled single-qubit gates.

use tessera_ir::{CircuitDag, HighLevelOp, Instruction, ParameterExpression, QubitId, StandardGate};

use crate::error::CompileResult;
use crate::registry::{SynthesisContext, SynthesisMethod};
use crate::unitary::{EPSILON, OneQubitBasis, Unitary2x2};

use super::append_1q;

/// `mcx/default` and `mcu/default`.
///
/// One control uses the ABC construction; `n` controls split off the last
/// control with `V = √U`:
///
/// ```text
/// C(V)[last→t] · C^{n-1}X[rest→last] · C(V†)[last→t] · C^{n-1}X[rest→last] · C^{n-1}(V)[rest→t]
/// ```
///
/// The result is exact including global phase. Gates with symbolic
/// parameters are declined.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecursiveMultiControlled;

impl SynthesisMethod for RecursiveMultiControlled {
    fn name(&self) -> &str {
        "default"
    }

    fn synthesize(
        &self,
        op: &HighLevelOp,
        _context: &SynthesisContext<'_>,
    ) -> CompileResult<Option<CircuitDag>> {
        let (base, num_ctrl) = match op {
            HighLevelOp::MultiControlledX { num_ctrl } => (Unitary2x2::x(), *num_ctrl),
            HighLevelOp::MultiControlled { base, num_ctrl } => match Unitary2x2::from_standard(base) {
                Some(u) => (u, *num_ctrl),
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        let mut dag = CircuitDag::with_size(num_ctrl + 1, 0);
        let controls: Vec<QubitId> = (0..num_ctrl).map(qubit).collect();
        controlled_1q(&mut dag, &controls, qubit(num_ctrl), &base)?;
        Ok(Some(dag))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn qubit(index: usize) -> QubitId {
    QubitId(index as u32)
}

fn approx_eq(a: &Unitary2x2, b: &Unitary2x2) -> bool {
    a.data.iter().zip(b.data).all(|(x, y)| (x - y).norm() < EPSILON)
}

/// Principal square root of a 2x2 unitary.
fn sqrt_2x2(u: &Unitary2x2) -> Unitary2x2 {
    let [a, b, c, d] = u.data;
    let trace = a + d;
    let mut s = (a * d - b * c).sqrt();
    if (trace + 2.0 * s).norm() < EPSILON {
        s = -s;
    }
    let t = (trace + 2.0 * s).sqrt();
    if t.norm() < EPSILON {
        // Scalar
        let r = a.sqrt();
        return Unitary2x2::new(r, b * 0.0, c * 0.0, r);
    }
    Unitary2x2::new((a + s) / t, b / t, c / t, (d + s) / t)
}

fn rotation(dag: &mut CircuitDag, make: fn(ParameterExpression) -> StandardGate, angle: f64, q: QubitId) -> CompileResult<()> {
    let angle = Unitary2x2::normalize_angle(angle);
    if angle.abs() > EPSILON {
        dag.apply(Instruction::single_qubit_gate(make(ParameterExpression::constant(angle)), q))?;
    }
    Ok(())
}

fn controlled_1q(dag: &mut CircuitDag, controls: &[QubitId], target: QubitId, u: &Unitary2x2) -> CompileResult<()> {
    match controls {
        [] => append_1q(dag, target, u, OneQubitBasis::ZYZ),
        [control] => single_control(dag, *control, target, u),
        [rest @ .., last] => {
            let v = sqrt_2x2(u);
            let x = Unitary2x2::x();
            controlled_1q(dag, &[*last], target, &v)?;
            controlled_1q(dag, rest, *last, &x)?;
            controlled_1q(dag, &[*last], target, &v.dagger())?;
            controlled_1q(dag, rest, *last, &x)?;
            controlled_1q(dag, rest, target, &v)
        }
    }
}

fn single_control(dag: &mut CircuitDag, control: QubitId, target: QubitId, u: &Unitary2x2) -> CompileResult<()> {
    let named = [
        (Unitary2x2::x(), StandardGate::CX),
        (Unitary2x2::y(), StandardGate::CY),
        (Unitary2x2::z(), StandardGate::CZ),
        (Unitary2x2::h(), StandardGate::CH),
    ];
    if let Some((_, gate)) = named.into_iter().find(|(m, _)| approx_eq(m, u)) {
        dag.apply(Instruction::two_qubit_gate(gate, control, target))?;
        return Ok(());
    }
    if u.is_identity() {
        return rotation(dag, StandardGate::P, u.phase_relative_to(&Unitary2x2::identity()), control);
    }

    // u = e^{iφ}·Rz(α)·Ry(β)·Rz(γ) = e^{iφ}·A·X·B·X·C with ABC = I
    let (alpha, beta, gamma, phi) = u.zyz_decomposition();
    rotation(dag, StandardGate::Rz, (gamma - alpha) / 2.0, target)?;
    dag.apply(Instruction::two_qubit_gate(StandardGate::CX, control, target))?;
    rotation(dag, StandardGate::Rz, -(gamma + alpha) / 2.0, target)?;
    rotation(dag, StandardGate::Ry, -beta / 2.0, target)?;
    dag.apply(Instruction::two_qubit_gate(StandardGate::CX, control, target))?;
    rotation(dag, StandardGate::Ry, beta / 2.0, target)?;
    rotation(dag, StandardGate::Rz, alpha, target)?;
    rotation(dag, StandardGate::P, phi, control)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix;

    fn assert_exact(op: &HighLevelOp) {
        let dag = RecursiveMultiControlled
            .synthesize(op, &SynthesisContext::default())
            .unwrap()
            .unwrap();
        let got = matrix::dag_unitary(&dag).unwrap();
        let expected = matrix::high_level_matrix(op).unwrap();
        assert!(
            matrix::distance(&expected, &got) < 1e-9,
            "{op:?} off by {}",
            matrix::distance(&expected, &got)
        );
        assert!(dag.topological_ops().all(|(_, i)| i.qubits.len() <= 2));
    }

    #[test]
    fn test_mcx_exact() {
        for num_ctrl in 0..=4 {
            assert_exact(&HighLevelOp::MultiControlledX { num_ctrl });
        }
    }

    #[test]
    fn test_single_control_named_gate() {
        let dag = RecursiveMultiControlled
            .synthesize(&HighLevelOp::MultiControlledX { num_ctrl: 1 }, &SynthesisContext::default())
            .unwrap()
            .unwrap();
        assert_eq!(dag.count_ops().get("cx"), Some(&1));
        assert_eq!(dag.num_ops(), 1);
    }

    #[test]
    fn test_mcu_exact() {
        let bases = [
            StandardGate::H,
            StandardGate::Rz(ParameterExpression::constant(0.3)),
            StandardGate::U(
                ParameterExpression::constant(1.1),
                ParameterExpression::constant(-0.4),
                ParameterExpression::constant(2.5),
            ),
            StandardGate::P(ParameterExpression::constant(0.7)),
            StandardGate::S,
        ];
        for base in bases {
            for num_ctrl in 1..=3 {
                assert_exact(&HighLevelOp::MultiControlled {
                    base: base.clone(),
                    num_ctrl,
                });
            }
        }
    }

    #[test]
    fn test_symbolic_base_declined() {
        let op = HighLevelOp::MultiControlled {
            base: StandardGate::Rz(ParameterExpression::symbol("theta")),
            num_ctrl: 2,
        };
        assert!(
            RecursiveMultiControlled
                .synthesize(&op, &SynthesisContext::default())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_square_root() {
        for u in [Unitary2x2::x(), Unitary2x2::h(), Unitary2x2::rz(0.9), Unitary2x2::identity().scaled(0.4)] {
            let v = sqrt_2x2(&u);
            assert!(approx_eq(&(v * v), &u));
        }
    }
}
