pub mod aws;
pub mod cost_explorer;
pub mod organizations;
pub mod ses;
pub mod synapse;
pub mod util;

pub use cost_explorer::CostExplorerClient;
pub use organizations::OrganizationsClient;
pub use ses::SesClient;
pub use synapse::SynapseClient;
