use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::info;

use crate::config::{ConfigLoader, InputParams};
use crate::domain::{EventName, IterationKey};
use crate::error::Gcmt3dError;
use crate::layout::WorkspacePaths;
use crate::processing::{ProcessingConfig, adapt};
use crate::rules::{GcmtRules, RuleTable};
use crate::solution::{CmtSolutionReader, SolutionReader, SourceSolution, write_solution};
use crate::stations::Inventory;
use crate::store::{ArtifactKind, IterationStore};

#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    pub event: EventName,
    pub root: Utf8PathBuf,
    pub waves: Vec<String>,
    pub parameters: Vec<String>,
    pub model: Vec<f64>,
    pub stations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InitProgress {
    pub inputs: bool,
    pub model: bool,
    pub stations: bool,
}

impl InitProgress {
    pub fn inspect(workspace: &WorkspacePaths) -> Self {
        let exists = |path: Utf8PathBuf| path.as_std_path().is_file();
        let store = IterationStore::new(workspace.clone());
        Self {
            inputs: exists(workspace.input_config())
                && exists(workspace.process_config())
                && exists(workspace.init_solution())
                && labelled_copy(workspace).is_some_and(exists),
            model: exists(store.names_path())
                && exists(store.scaling_path())
                && store.has(ArtifactKind::Model, IterationKey::INITIAL),
            stations: exists(workspace.station_xml()) && exists(workspace.station_listing()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inputs && self.model && self.stations
    }
}

fn labelled_copy(workspace: &WorkspacePaths) -> Option<Utf8PathBuf> {
    let event: EventName = workspace.root.file_name()?.parse().ok()?;
    let params = ConfigLoader::resolve(&workspace.input_config()).ok()?;
    Some(workspace.labelled_solution(&event, &params.label_suffix()))
}

#[derive(Debug, Clone)]
pub struct Initializer<R: SolutionReader, T: RuleTable> {
    reader: R,
    rules: T,
}

impl Initializer<CmtSolutionReader, GcmtRules> {
    pub fn gcmt() -> Self {
        Self::new(CmtSolutionReader, GcmtRules)
    }
}

impl<R: SolutionReader, T: RuleTable> Initializer<R, T> {
    pub fn new(reader: R, rules: T) -> Self {
        Self { reader, rules }
    }

    pub fn initialize(
        &self,
        solution_file: &Utf8Path,
        workspace: &WorkspacePaths,
        params: &InputParams,
    ) -> Result<InitReport, Gcmt3dError> {
        workspace.create_all()?;
        let processing = self.prepare_inputs(solution_file, workspace, params)?;
        let (event, parameters, model) = self.prepare_model(workspace)?;
        let inventory = Self::prepare_stations(workspace)?;

        info!(
            event = %event,
            waves = processing.len(),
            stations = inventory.len(),
            "workspace initialized"
        );
        Ok(InitReport {
            event,
            root: workspace.root.clone(),
            waves: processing.waves.keys().cloned().collect(),
            parameters,
            model,
            stations: inventory.len(),
        })
    }

    pub fn prepare_inputs(
        &self,
        solution_file: &Utf8Path,
        workspace: &WorkspacePaths,
        params: &InputParams,
    ) -> Result<ProcessingConfig, Gcmt3dError> {
        let solution = self.reader.read(solution_file)?;
        ConfigLoader::write(params, &workspace.input_config())?;

        let template = ProcessingConfig::template_for(params)?;
        let processing = adapt(
            solution.moment_magnitude(),
            solution.depth_in_m(),
            template,
            params.duration,
            &self.rules,
        );
        processing.write(&workspace.process_config())?;

        let event = solution.event_name();
        write_solution(
            &solution,
            &workspace.labelled_solution(event, &params.label_suffix()),
        )?;
        write_solution(&solution, &workspace.init_solution())?;
        info!(event = %event, waves = processing.len(), "wrote input configuration");
        Ok(processing)
    }

    pub fn prepare_model(
        &self,
        workspace: &WorkspacePaths,
    ) -> Result<(EventName, Vec<String>, Vec<f64>), Gcmt3dError> {
        let solution = self.reader.read(&workspace.init_solution())?;
        let params = ConfigLoader::resolve(&workspace.input_config())?;

        let names = params.parameter_names();
        let model = model_vector(&solution, &names)?;
        let scaling = params.scaling_vector();

        let store = IterationStore::new(workspace.clone());
        store.write_names(&names)?;
        store.write_model(&model, IterationKey::INITIAL)?;
        store.write_scaling(&scaling)?;
        info!(event = %solution.event_name(), parameters = names.len(), "wrote initial model");
        Ok((solution.event_name().clone(), names, model))
    }

    pub fn prepare_stations(workspace: &WorkspacePaths) -> Result<Inventory, Gcmt3dError> {
        let inventory = Inventory::from_dir(&workspace.station_dir())?;
        inventory.write_station_xml(&workspace.station_xml())?;
        inventory.write_station_listing(&workspace.station_listing())?;
        info!(stations = inventory.len(), "wrote station inventory");
        Ok(inventory)
    }
}

pub fn model_vector<S: SourceSolution + ?Sized>(
    solution: &S,
    names: &[String],
) -> Result<Vec<f64>, Gcmt3dError> {
    names
        .iter()
        .map(|name| {
            solution
                .attribute(name)
                .ok_or_else(|| Gcmt3dError::UnknownParameter(name.clone()))
        })
        .collect()
}
