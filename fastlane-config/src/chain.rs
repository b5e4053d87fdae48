use serde::{Deserialize, Serialize};
use url::Url;

use crate::consts;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ChainConfig {
    /// JSON-RPC endpoint of the chain the task manager is deployed on.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: Url,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
        }
    }
}

fn default_rpc_url() -> Url {
    consts::DEFAULT_RPC_URL
        .parse()
        .expect("default rpc url should be valid")
}
