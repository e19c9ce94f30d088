//! User-Agent sent with every archive request.

/// Project URL so archive operators can identify the client.
const PROJECT_UA_URL: &str = "https://github.com/fierce/gazette-harvester";

/// Default User-Agent: `gazette-harvester/{version} (+{url})`.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("gazette-harvester/{version} (archive-mirror; +{PROJECT_UA_URL})")
}
