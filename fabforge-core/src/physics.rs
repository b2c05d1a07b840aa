use std::collections::HashMap;

/// What a physics collaborator reports for one process step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicsOutcome {
    pub success: bool,
    pub results: HashMap<String, f64>,
}

impl PhysicsOutcome {
    pub fn success(results: HashMap<String, f64>) -> Self {
        Self {
            success: true,
            results,
        }
    }

    pub fn failure() -> Self {
        Self::default()
    }
}

/// The external process-physics evaluator (oxidation, doping, deposition, ...).
///
/// The wafer is opaque to the core: it is borrowed mutably for each call and
/// never inspected. Returning `Err` is the collaborator raising; the scheduler
/// and the optimizer turn it into a failed step or an infeasible evaluation.
pub trait PhysicsEvaluator {
    type Wafer;

    fn execute(
        &mut self,
        wafer: &mut Self::Wafer,
        process_type: &str,
        parameters: &HashMap<String, f64>,
    ) -> anyhow::Result<PhysicsOutcome>;
}

impl<P: PhysicsEvaluator + ?Sized> PhysicsEvaluator for Box<P> {
    type Wafer = P::Wafer;

    fn execute(
        &mut self,
        wafer: &mut Self::Wafer,
        process_type: &str,
        parameters: &HashMap<String, f64>,
    ) -> anyhow::Result<PhysicsOutcome> {
        (**self).execute(wafer, process_type, parameters)
    }
}

impl<P: PhysicsEvaluator + ?Sized> PhysicsEvaluator for &mut P {
    type Wafer = P::Wafer;

    fn execute(
        &mut self,
        wafer: &mut Self::Wafer,
        process_type: &str,
        parameters: &HashMap<String, f64>,
    ) -> anyhow::Result<PhysicsOutcome> {
        (**self).execute(wafer, process_type, parameters)
    }
}
