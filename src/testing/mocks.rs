use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use crate::error::{ResearchError, Result};
use crate::sources::{Findings, Source, Stage};
use crate::utils::ToolRunner;

/// Scripted local tools keyed by the full command line; unknown commands fail
#[derive(Default)]
pub struct FakeTools {
    outputs: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl FakeTools {
    pub fn with(mut self, command_line: &str, stdout: &str) -> Self {
        self.outputs.insert(command_line.to_string(), stdout.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolRunner for FakeTools {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let line = std::iter::once(program).chain(args.iter().copied()).collect::<Vec<_>>().join(" ");
        self.calls.lock().unwrap().push(line.clone());
        self.outputs.get(&line).cloned().ok_or(ResearchError::ToolFailed {
            program: program.to_string(),
            code: Some(1),
            stderr: format!("no scripted output for `{line}`"),
        })
    }
}

/// Source double that counts attempts and replays a fixed answer
pub struct CountingSource {
    name: &'static str,
    stage: Stage,
    answer: std::result::Result<Findings, String>,
    calls: AtomicUsize,
}

impl CountingSource {
    pub fn ok(name: &'static str, stage: Stage, findings: Findings) -> Arc<Self> {
        Arc::new(Self { name, stage, answer: Ok(findings), calls: AtomicUsize::new(0) })
    }

    pub fn failing(name: &'static str, stage: Stage) -> Arc<Self> {
        Arc::new(Self {
            name,
            stage,
            answer: Err(format!("{name} unavailable")),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for CountingSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    async fn attempt(&self, _package: &str, _found: &Findings) -> Result<Findings> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone().map_err(ResearchError::NotFound)
    }
}
