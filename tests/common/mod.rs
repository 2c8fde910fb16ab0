#![allow(dead_code)]

use sensetop::data::{ProbeResult, Reading, Unit, UnavailableReason};
use sensetop::probes::SensorProbe;

/// Probe that replays a fixed script, repeating the last entry forever.
pub struct ScriptedProbe {
    id: &'static str,
    script: Vec<ProbeResult>,
    cursor: usize,
}

impl ScriptedProbe {
    pub fn new(id: &'static str, script: Vec<ProbeResult>) -> Self {
        assert!(!script.is_empty(), "script needs at least one entry");
        Self {
            id,
            script,
            cursor: 0,
        }
    }

    pub fn boxed(id: &'static str, script: Vec<ProbeResult>) -> Box<dyn SensorProbe> {
        Box::new(Self::new(id, script))
    }
}

impl SensorProbe for ScriptedProbe {
    fn source_id(&self) -> &str {
        self.id
    }

    fn title(&self) -> &str {
        self.id
    }

    fn read(&mut self) -> ProbeResult {
        let result = self.script[self.cursor.min(self.script.len() - 1)].clone();
        self.cursor += 1;
        result
    }
}

pub struct PanickingProbe;

impl SensorProbe for PanickingProbe {
    fn source_id(&self) -> &str {
        "panicking"
    }

    fn title(&self) -> &str {
        "Panicking"
    }

    fn read(&mut self) -> ProbeResult {
        panic!("driver fault");
    }
}

pub fn celsius(id: &str, label: &str, value: f64) -> ProbeResult {
    ProbeResult::Ok(vec![Reading::new(id, label, value, Unit::Celsius).unwrap()])
}

pub fn unavailable(reason: UnavailableReason) -> ProbeResult {
    ProbeResult::Unavailable(reason)
}
