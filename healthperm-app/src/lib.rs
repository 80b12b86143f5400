pub mod scenario;

pub use scenario::{load_scenario, run_scenario, ManageAction, Scenario, ScenarioReport};
