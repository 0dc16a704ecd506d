//! Per-run output directory, in CGS units.
//!
//! - `trajectory.csv`: one row per accepted step.
//! - `bath.csv`: bath deflection on the radial grid per accepted step.
//! - `bath_amplitudes.csv`: Fourier-Bessel amplitudes of that deflection.
//! - `summary.json`: problem constants and run outcome.
//! - `error.json`: terminal error and the last accepted state.

use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::info;

use crate::config::setup::parameters::constants::{ProblemConstants, UnitConvention};
use crate::domain::DomainOperator;
use crate::dynamics::RunSummary;
use crate::error::{Result, SimError};
use crate::state::{SimulationState, StepSummary};

#[derive(serde::Serialize, Debug)]
struct SummaryRecord<'a> {
    constants: &'a ProblemConstants,
    units: &'a UnitConvention,
    mode_count: usize,
    impact_speed: f64,
    impact_angle: f64,
    // s
    final_time_step: f64,
    run: &'a RunSummary,
}

#[derive(serde::Serialize, Debug)]
pub struct ErrorRecord<'a> {
    pub kind: &'static str,
    pub message: String,
    pub state: &'a SimulationState,
}

pub struct RunWriter {
    dir: PathBuf,
    units: UnitConvention,
    operator: Arc<DomainOperator>,
    trajectory: csv::Writer<File>,
    bath: csv::Writer<File>,
    bath_amplitudes: csv::Writer<File>,
}

impl RunWriter {
    pub fn create<P: AsRef<Path>>(
        dir: P,
        constants: &ProblemConstants,
        operator: Arc<DomainOperator>,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut trajectory = csv::Writer::from_path(dir.join("trajectory.csv"))?;
        let mut header: Vec<String> = [
            "t",
            "step",
            "z",
            "vz",
            "contact_points",
            "patch_radius",
            "contact_angle",
            "force",
            "time_step",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        header.extend((1..=constants.mode_count).map(|l| format!("a_{l}")));
        header.extend((1..=constants.mode_count).map(|l| format!("pa_{l}")));
        trajectory.write_record(&header)?;

        let mut bath = csv::Writer::from_path(dir.join("bath.csv"))?;
        let mut header = vec!["t".to_string()];
        header.extend((0..operator.node_count()).map(|i| format!("eta_{i}")));
        bath.write_record(&header)?;

        let mut bath_amplitudes = csv::Writer::from_path(dir.join("bath_amplitudes.csv"))?;
        let mut header = vec!["t".to_string()];
        header.extend((0..operator.mode_count()).map(|j| format!("b_{j}")));
        bath_amplitudes.write_record(&header)?;

        info!("Writing run output to {}", dir.display());
        Ok(RunWriter {
            dir,
            units: constants.units,
            operator,
            trajectory,
            bath,
            bath_amplitudes,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_step(
        &mut self,
        state: &SimulationState,
        summary: Option<&StepSummary>,
    ) -> Result<()> {
        let u = &self.units;
        let n = state.mode_count();
        let (patch_radius, force, time_step) = summary
            .map(|s| (s.patch_radius, s.force, s.time_step))
            .unwrap_or((0.0, 0.0, 0.0));

        let mut row = vec![
            (state.t * u.time).to_string(),
            state.step.to_string(),
            (state.z * u.length).to_string(),
            (state.vz * u.velocity).to_string(),
            state.contact_points.to_string(),
            (patch_radius * u.length).to_string(),
            state.contact_angle.to_string(),
            (force * u.force).to_string(),
            (time_step * u.time).to_string(),
        ];
        row.extend(state.amplitudes.iter().map(|a| (a * u.length).to_string()));
        match summary {
            Some(s) => row.extend(
                s.pressure_amplitudes
                    .iter()
                    .map(|p| (p * u.pressure).to_string()),
            ),
            None => row.extend((0..n).map(|_| "0".to_string())),
        }
        self.trajectory.write_record(&row)?;

        let mut row = vec![(state.t * u.time).to_string()];
        row.extend(state.bath_deflection.iter().map(|e| (e * u.length).to_string()));
        self.bath.write_record(&row)?;

        let amplitudes = self.operator.bath_amplitudes(&state.bath_deflection);
        let mut row = vec![(state.t * u.time).to_string()];
        row.extend(amplitudes.iter().map(|b| (b * u.length).to_string()));
        self.bath_amplitudes.write_record(&row)?;
        Ok(())
    }

    pub fn write_summary(&mut self, run: &RunSummary, constants: &ProblemConstants) -> Result<()> {
        self.flush()?;
        let record = SummaryRecord {
            constants,
            units: &self.units,
            mode_count: constants.mode_count,
            impact_speed: constants.impact_speed,
            impact_angle: constants.impact_angle,
            final_time_step: run.final_time_step * self.units.time,
            run,
        };
        let file = File::create(self.dir.join("summary.json"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &record)?;
        Ok(())
    }

    pub fn write_error(&mut self, error: &SimError, state: &SimulationState) -> Result<()> {
        self.flush()?;
        let record = ErrorRecord {
            kind: error.kind(),
            message: error.to_string(),
            state,
        };
        let file = File::create(self.dir.join("error.json"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &record)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.trajectory.flush()?;
        self.bath.flush()?;
        self.bath_amplitudes.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::setup::parameters::physical::water_drop;
    use crate::domain::{dtn, DomainKey};
    use crate::dynamics::RunOutcome;
    use approx::assert_relative_eq;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dropbath-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn writes_every_file() {
        let dir = scratch_dir("writer");
        let constants = water_drop(3).as_constants();
        // Grid r = 0, 1/3, 2/3, 1.
        let operator = Arc::new(dtn::generate(&DomainKey::new(1, 3, None)).unwrap());
        let mut writer = RunWriter::create(&dir, &constants, Arc::clone(&operator)).unwrap();
        let mut state = SimulationState::new(3, 4, constants.initial_velocity);
        writer.write_step(&state, None).unwrap();
        // A pure second Fourier-Bessel mode of the bath.
        state.bath_deflection = operator.basis.column(2) * 0.01;
        writer.write_step(&state, None).unwrap();
        let summary = RunSummary {
            outcome: RunOutcome::NoContact,
            impact: None,
            detachment: None,
            contact_time: None,
            restitution: None,
            max_patch_radius: 0.0,
            accepted_steps: 1,
            rejected_steps: 0,
            final_time: 0.01,
            final_time_step: 0.01,
        };
        writer.write_summary(&summary, &constants).unwrap();
        writer
            .write_error(&SimError::GeometryDegenerate("test".to_string()), &state)
            .unwrap();

        let trajectory = fs::read_to_string(dir.join("trajectory.csv")).unwrap();
        let lines: Vec<&str> = trajectory.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("t,step,z,vz,contact_points"));
        assert!(lines[0].ends_with("a_3,pa_1,pa_2,pa_3"));
        // z = R at the start.
        let z: f64 = lines[1].split(',').nth(2).unwrap().parse().unwrap();
        assert!((z - 0.035).abs() < 1e-15);

        let bath = fs::read_to_string(dir.join("bath.csv")).unwrap();
        assert_eq!(bath.lines().next().unwrap(), "t,eta_0,eta_1,eta_2,eta_3");

        let amplitudes = fs::read_to_string(dir.join("bath_amplitudes.csv")).unwrap();
        let lines: Vec<&str> = amplitudes.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "t,b_0,b_1,b_2,b_3");
        let flat: Vec<f64> = lines[1].split(',').skip(1).map(|v| v.parse().unwrap()).collect();
        assert!(flat.iter().all(|b| *b == 0.0));
        let wave: Vec<f64> = lines[2].split(',').skip(1).map(|v| v.parse().unwrap()).collect();
        for (j, b) in wave.iter().enumerate() {
            let expected = if j == 2 { 0.01 * 0.035 } else { 0.0 };
            assert_relative_eq!(*b, expected, epsilon = 1e-12);
        }

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("summary.json")).unwrap()).unwrap();
        assert_eq!(summary["run"]["outcome"], "NoContact");
        assert_eq!(summary["mode_count"], 3);
        assert!(summary["constants"]["air_viscosity_ratio"].as_f64().unwrap() > 0.0);

        let error: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("error.json")).unwrap()).unwrap();
        assert_eq!(error["kind"], "GeometryDegenerateError");
        assert_eq!(error["state"]["z"], 1.0);
        fs::remove_dir_all(&dir).unwrap();
    }
}
