use crate::error::{FabforgeError, FabforgeResult};
use crate::scheduler::context::ExecutionContext;
use csv::Writer;
use fabforge_schemas::step::ProcessStep;
use serde::{Deserialize, Serialize};
use std::fs;

/// One row of the per-run step trace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepTraceEntry {
    pub execution_id: String,
    pub step_id: String,
    pub process_type: String,
    pub status: String,
    pub attempt: u32,
    pub actual_time_s: f64,
    pub thermal_budget: f64,
    pub parameters_json: String,
    pub results_json: String,
    pub timestamp: String,
}

/// Appends a CSV row for every terminal step transition.
pub struct StepTraceLogger {
    writer: Writer<fs::File>,
    path: String,
}

impl StepTraceLogger {
    pub fn new(path: &str) -> FabforgeResult<Self> {
        let writer = Writer::from_path(path).map_err(|e| FabforgeError::CsvError(path.to_string(), e))?;
        Ok(Self {
            writer,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn log_step(
        &mut self,
        context: &ExecutionContext,
        step: &ProcessStep,
        thermal_budget: f64,
    ) -> FabforgeResult<()> {
        let entry = StepTraceEntry {
            execution_id: context.execution_id.clone(),
            step_id: step.id.clone(),
            process_type: step.process_type.clone(),
            status: step.status.to_string(),
            attempt: context.attempts(&step.id),
            actual_time_s: step.actual_time,
            thermal_budget,
            parameters_json: serde_json::to_string(&step.parameters)?,
            results_json: serde_json::to_string(&step.results)?,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        self.writer
            .serialize(entry)
            .map_err(|e| FabforgeError::CsvError(self.path.clone(), e))?;
        self.writer
            .flush()
            .map_err(|e| FabforgeError::FileIO(self.path.clone(), e))?;
        Ok(())
    }
}

/// Reads back a trace written by [`StepTraceLogger`].
pub fn read_step_trace(path: &str) -> FabforgeResult<Vec<StepTraceEntry>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| FabforgeError::CsvError(path.to_string(), e))?;
    let mut entries = Vec::new();
    for result in reader.deserialize() {
        let record: StepTraceEntry = result.map_err(|e| FabforgeError::CsvError(path.to_string(), e))?;
        entries.push(record);
    }
    Ok(entries)
}
