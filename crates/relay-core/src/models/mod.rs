pub mod agent;
pub mod automation;
pub mod credential;
pub mod run;

pub use agent::*;
pub use automation::*;
pub use credential::*;
pub use run::*;
