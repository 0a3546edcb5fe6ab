use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::Command;

// ---------------------------------------------------------------------------
// Static catalog
// ---------------------------------------------------------------------------

/// Node classes known to exist in each `diagrams.gcp.*` module.
const GCP_MODULES: &[(&str, &[&str])] = &[
    ("diagrams.gcp.api", &["APIGateway", "Apigee", "Endpoints"]),
    (
        "diagrams.gcp.analytics",
        &[
            "BigQuery", "Dataflow", "PubSub", "Composer", "DataCatalog", "DataFusion", "Datalab",
            "Dataprep", "Dataproc", "Genomics",
        ],
    ),
    (
        "diagrams.gcp.compute",
        &[
            "AppEngine", "ComputeEngine", "Functions", "KubernetesEngine", "ContainerOptimizedOS",
            "GKEOnPrem", "GPU", "Run",
        ],
    ),
    (
        "diagrams.gcp.database",
        &["BigTable", "SQL", "Spanner", "Firestore", "Memorystore", "Datastore"],
    ),
    ("diagrams.gcp.iot", &["IotCore"]),
    (
        "diagrams.gcp.network",
        &[
            "LoadBalancing", "CDN", "DNS", "VirtualPrivateCloud", "VPN", "Armor",
            "DedicatedInterconnect", "ExternalIpAddresses", "FirewallRules", "NAT", "Network",
            "PartnerInterconnect", "PremiumNetworkTier", "Router", "Routes", "StandardNetworkTier",
            "TrafficDirector",
        ],
    ),
    ("diagrams.gcp.operations", &["Monitoring", "Logging"]),
    ("diagrams.gcp.storage", &["Storage", "GCS", "Filestore", "PersistentDisk"]),
];

/// Lower-cased misspellings mapped to the correctly cased class.
const GCP_CASE_FIXES: &[(&str, &str)] = &[
    ("pubsub", "PubSub"),
    ("bigquery", "BigQuery"),
    ("bigtable", "BigTable"),
    ("storage", "Storage"),
    ("virtualprivatecloud", "VirtualPrivateCloud"),
    ("apigateway", "APIGateway"),
    ("api_gateway", "APIGateway"),
    ("api", "APIGateway"),
    ("gateway", "APIGateway"),
];

/// Modules models like to invent, with what to use instead.
pub const INVALID_MODULES: &[(&str, &str)] = &[
    (
        "diagrams.gcp.monitoring",
        "Use 'diagrams.gcp.operations.Monitoring' instead",
    ),
    (
        "diagrams.gcp.general",
        "Use 'from diagrams import Cluster' instead for grouping components",
    ),
];

const CLASS_HINTS: &[(&str, &str)] = &[
    ("Monitoring", "Use 'from diagrams.gcp.operations import Monitoring'"),
    ("Compute", "Use 'from diagrams.gcp.compute import ComputeEngine' instead"),
    ("Bigquery", "Use 'from diagrams.gcp.analytics import BigQuery' (note the capital 'Q')"),
    ("Pubsub", "Use 'from diagrams.gcp.analytics import PubSub' (note the capital 'S')"),
    ("Bigtable", "Use 'from diagrams.gcp.database import BigTable' (note the capital 'T')"),
    ("SQL", "Use 'from diagrams.gcp.database import SQL'"),
];

pub fn gcp_classes(module: &str) -> Option<&'static [&'static str]> {
    GCP_MODULES
        .iter()
        .find(|(m, _)| *m == module)
        .map(|(_, classes)| *classes)
}

pub fn gcp_case_fix(class: &str) -> Option<&'static str> {
    let lower = class.to_lowercase();
    GCP_CASE_FIXES
        .iter()
        .find(|(k, _)| *k == lower)
        .map(|(_, v)| *v)
}

pub fn invalid_module_hint(module: &str) -> Option<(&'static str, &'static str)> {
    INVALID_MODULES
        .iter()
        .find(|(bad, _)| module == *bad || module.starts_with(&format!("{bad}.")))
        .copied()
}

/// Hint appended to a "does not contain class" message.
pub fn class_hint(module: &str, class: &str) -> String {
    match CLASS_HINTS.iter().find(|(c, _)| *c == class) {
        Some((_, hint)) => hint.to_string(),
        None => {
            let provider = module.split('.').nth(1).unwrap_or("gcp");
            format!("Check docs at https://diagrams.mingrammer.com/docs/nodes/{provider}")
        }
    }
}

// ---------------------------------------------------------------------------
// Introspection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Introspection {
    /// Public names exported by the module.
    Classes(Vec<String>),
    ModuleNotFound,
    /// The check could not run (no interpreter, timeout); callers skip it.
    Unavailable(String),
}

/// Looks up what a module of the installed `diagrams` library exports.
#[async_trait]
pub trait ModuleIntrospector: Send + Sync {
    async fn introspect(&self, module: &str) -> Introspection;
}

const INTROSPECT_SCRIPT: &str = "import importlib, json, sys\n\
m = importlib.import_module(sys.argv[1])\n\
print(json.dumps([n for n in dir(m) if not n.startswith('_')]))\n";

/// Asks a Python interpreter to import the module. Results are cached per
/// module so repeated validation of the same source is stable and cheap.
pub struct PythonIntrospector {
    python: String,
    timeout: Duration,
    cache: Mutex<HashMap<String, Introspection>>,
}

impl PythonIntrospector {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
            timeout: Duration::from_secs(10),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn run(&self, module: &str) -> Introspection {
        let child = Command::new(&self.python)
            .arg("-c")
            .arg(INTROSPECT_SCRIPT)
            .arg(module)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(c) => c,
            Err(e) => return Introspection::Unavailable(format!("cannot run {}: {e}", self.python)),
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(o)) => o,
            Ok(Err(e)) => return Introspection::Unavailable(e.to_string()),
            Err(_) => return Introspection::Unavailable("introspection timed out".into()),
        };

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            return match serde_json::from_str::<Vec<String>>(stdout.trim()) {
                Ok(names) => Introspection::Classes(names),
                Err(e) => Introspection::Unavailable(format!("unexpected introspection output: {e}")),
            };
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("ModuleNotFoundError") {
            // Distinguish a missing submodule from a missing library.
            if stderr.contains("No module named 'diagrams'") {
                Introspection::Unavailable("the 'diagrams' package is not installed".into())
            } else {
                Introspection::ModuleNotFound
            }
        } else {
            Introspection::Unavailable(stderr.trim().to_string())
        }
    }
}

#[async_trait]
impl ModuleIntrospector for PythonIntrospector {
    async fn introspect(&self, module: &str) -> Introspection {
        if let Some(hit) = self.cache.lock().ok().and_then(|c| c.get(module).cloned()) {
            return hit;
        }
        let result = self.run(module).await;
        if !matches!(result, Introspection::Unavailable(_)) {
            if let Ok(mut c) = self.cache.lock() {
                c.insert(module.to_string(), result.clone());
            }
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
