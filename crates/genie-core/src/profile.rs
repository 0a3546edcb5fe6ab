//! Personality profiles: fetching from Crystal, storing on disk, and turning
//! a stored profile into prompt context for the communication advisor.

use crate::error::{GenieError, Result};
use crate::io;
use crate::paths;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PROFILE_BASE_URL: &str = "https://api.crystalknows.com/v1";

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// A profile exactly as the API returned it. Only the fields the advisor
/// needs are read; everything else is kept for display and round-tripping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(pub Value);

impl Profile {
    fn data(&self) -> &Value {
        &self.0["data"]
    }

    pub fn first_name(&self) -> Option<&str> {
        self.data()["first_name"].as_str().filter(|s| !s.trim().is_empty())
    }

    pub fn last_name(&self) -> Option<&str> {
        self.data()["last_name"].as_str().filter(|s| !s.trim().is_empty())
    }

    pub fn display_name(&self) -> String {
        match (self.first_name(), self.last_name()) {
            (Some(f), Some(l)) => format!("{f} {l}"),
            (Some(f), None) => f.to_string(),
            (None, Some(l)) => l.to_string(),
            (None, None) => "Unknown".to_string(),
        }
    }

    /// `first_last`, defaulting to `unknown_user`, sanitized for the filesystem.
    pub fn file_stem(&self) -> String {
        paths::sanitize_stem(&format!(
            "{}_{}",
            self.first_name().unwrap_or("unknown"),
            self.last_name().unwrap_or("user")
        ))
    }

    fn personality(&self, key: &str) -> Option<String> {
        match &self.data()["personalities"][key] {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn phrases(&self, section: &str) -> Vec<String> {
        self.data()["content"][section]["phrase"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Prompt context describing how this person communicates.
    pub fn personality_context(&self) -> String {
        let na = || "N/A".to_string();
        let mut out = String::new();
        out.push_str("CORE TRAITS:\n");
        let _ = writeln!(out, "- DISC Type: {}", self.personality("disc_type").unwrap_or_else(na));
        let _ = writeln!(out, "- Archetype: {}", self.personality("archetype").unwrap_or_else(na));
        let _ = writeln!(
            out,
            "- Myers-Briggs: {}",
            self.personality("myers_briggs_type").unwrap_or_else(na)
        );

        let _ = writeln!(out, "\nCOMMUNICATION STYLE:\n{}", bullets(&self.phrases("communication")));

        let traits = match self.data()["personalities"]["behavioral_traits"].as_object() {
            Some(map) if !map.is_empty() => map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => format!("- {k}: {s}"),
                    other => format!("- {k}: {other}"),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            _ => na(),
        };
        let _ = writeln!(out, "\nBEHAVIORAL TRAITS:\n{traits}");
        let _ = writeln!(out, "\nSTRENGTHS:\n{}", bullets(&self.phrases("strengths")));
        let _ = writeln!(out, "\nMOTIVATIONS:\n{}", bullets(&self.phrases("motivation")));
        let _ = writeln!(
            out,
            "\nCOMMUNICATION PREFERENCES:\n- Building Trust: {}\n- Working Together: {}",
            bullets(&self.phrases("building_trust")),
            bullets(&self.phrases("working_together"))
        );
        let _ = write!(
            out,
            "\nBUSINESS STYLE:\n- Meeting Style: {}\n- Negotiation: {}",
            bullets(&self.phrases("meeting")),
            bullets(&self.phrases("negotiating"))
        );
        out
    }
}

fn bullets(items: &[String]) -> String {
    if items.is_empty() {
        return "N/A".to_string();
    }
    items
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// ProfileClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileLookup {
    Email(String),
    LinkedIn(String),
}

impl ProfileLookup {
    fn query(&self) -> (&'static str, &str) {
        match self {
            ProfileLookup::Email(e) => ("email", e),
            ProfileLookup::LinkedIn(u) => ("linkedin_url", u),
        }
    }
}

impl fmt::Display for ProfileLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileLookup::Email(e) => write!(f, "email: {e}"),
            ProfileLookup::LinkedIn(u) => write!(f, "LinkedIn URL: {u}"),
        }
    }
}

/// Crystal profiles API client (bearer token).
pub struct ProfileClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl ProfileClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn from_env(base_url: impl Into<String>, token_env: &str) -> Result<Self> {
        let token = std::env::var(token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| GenieError::Configuration(format!("{token_env} is not set")))?;
        Ok(Self::new(base_url, token.trim()))
    }

    pub async fn fetch(&self, lookup: &ProfileLookup) -> Result<Profile> {
        let (param, value) = lookup.query();
        let resp = self
            .client
            .get(format!("{}/profiles", self.base_url))
            .query(&[(param, value)])
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| GenieError::Upstream(format!("Failed to fetch profile: {e}")))?;

        let status = resp.status().as_u16();
        tracing::debug!(%lookup, status, "profile response");
        match status {
            200..=299 => {
                let body = resp.text().await.map_err(|e| GenieError::Upstream(e.to_string()))?;
                Ok(Profile(serde_json::from_str(&body)?))
            }
            404 => Err(GenieError::NotFound(format!("No profile found for {lookup}"))),
            401 => Err(GenieError::Upstream(
                "Authentication failed. Please check your profile API token.".into(),
            )),
            402 => Err(GenieError::Upstream(
                "Payment required. Please check your subscription status.".into(),
            )),
            403 => Err(GenieError::Upstream(
                "Access forbidden. Please check your API permissions.".into(),
            )),
            429 => Err(GenieError::Upstream(
                "Rate limit exceeded. Please try again later.".into(),
            )),
            other => {
                let body = resp.text().await.unwrap_or_default();
                Err(GenieError::Upstream(format!("Failed to fetch profile ({other}): {body}")))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ProfileStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileEntry {
    pub stem: String,
    pub name: String,
}

/// Profiles saved as `<first>_<last>.json`. Saving a profile with the same
/// name replaces the earlier one.
pub struct ProfileStore {
    root: PathBuf,
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            dir: paths::profiles_dir(root),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        let stem = name.trim().trim_end_matches(".json");
        paths::profile_path(&self.root, &paths::sanitize_stem(stem))
    }

    pub fn save(&self, profile: &Profile) -> Result<String> {
        let stem = profile.file_stem();
        let data = serde_json::to_string_pretty(profile)?;
        io::atomic_write(&paths::profile_path(&self.root, &stem), data.as_bytes())?;
        Ok(stem)
    }

    pub fn list(&self) -> Result<Vec<ProfileEntry>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                entries.push(ProfileEntry {
                    stem: stem.to_string(),
                    name: stem.replace('_', " "),
                });
            }
        }
        entries.sort_by(|a, b| a.stem.cmp(&b.stem));
        Ok(entries)
    }

    /// Load by stem (`Ada_Lovelace`) or display name (`Ada Lovelace`).
    pub fn load(&self, name: &str) -> Result<Profile> {
        let path = self.path_for(name);
        if !path.exists() {
            return Err(GenieError::NotFound(format!("profile '{name}'")));
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name);
        if !path.exists() {
            return Err(GenieError::NotFound(format!("profile '{name}'")));
        }
        std::fs::remove_file(path)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use tempfile::TempDir;

    fn ada() -> Profile {
        Profile(json!({
            "data": {
                "first_name": "Ada",
                "last_name": "Lovelace",
                "personalities": {
                    "disc_type": "Dc",
                    "archetype": "Architect",
                    "myers_briggs_type": "INTJ",
                    "behavioral_traits": {"pace": "deliberate"}
                },
                "content": {
                    "communication": {"phrase": ["Be direct", "Bring data"]},
                    "negotiating": {"phrase": ["Lead with logic"]}
                }
            }
        }))
    }

    #[test]
    fn stem_defaults_and_sanitizes() {
        assert_eq!(ada().file_stem(), "Ada_Lovelace");
        assert_eq!(Profile(json!({"data": {}})).file_stem(), "unknown_user");
        assert_eq!(
            Profile(json!({"data": {"first_name": "../x", "last_name": "Y"}})).file_stem(),
            "x_Y"
        );
    }

    #[test]
    fn personality_context_lists_traits_and_phrases() {
        let ctx = ada().personality_context();
        assert!(ctx.contains("- DISC Type: Dc"));
        assert!(ctx.contains("- Myers-Briggs: INTJ"));
        assert!(ctx.contains("COMMUNICATION STYLE:\n- Be direct\n- Bring data"));
        assert!(ctx.contains("- pace: deliberate"));
        assert!(ctx.contains("STRENGTHS:\nN/A"));
        assert!(ctx.contains("- Negotiation: - Lead with logic"));
    }

    #[test]
    fn store_round_trip_and_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(dir.path());
        assert!(store.list().unwrap().is_empty());

        assert_eq!(store.save(&ada()).unwrap(), "Ada_Lovelace");
        let mut newer = ada();
        newer.0["data"]["personalities"]["disc_type"] = json!("C");
        store.save(&newer).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Ada Lovelace");

        let loaded = store.load("Ada Lovelace").unwrap();
        assert_eq!(loaded, newer);
        assert_eq!(store.load("Ada_Lovelace.json").unwrap(), newer);

        store.delete("Ada_Lovelace").unwrap();
        assert!(matches!(store.load("Ada Lovelace"), Err(GenieError::NotFound(_))));
        assert!(matches!(store.delete("Ada Lovelace"), Err(GenieError::NotFound(_))));
    }

    #[tokio::test]
    async fn fetch_by_email_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/profiles")
            .match_query(Matcher::UrlEncoded("email".into(), "ada@example.com".into()))
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(ada().0.to_string())
            .create_async()
            .await;
        let client = ProfileClient::new(server.url(), "tok");
        let p = client
            .fetch(&ProfileLookup::Email("ada@example.com".into()))
            .await
            .unwrap();
        assert_eq!(p.display_name(), "Ada Lovelace");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_maps_status_codes() {
        let mut server = mockito::Server::new_async().await;
        let client = ProfileClient::new(server.url(), "tok");
        let lookup = ProfileLookup::LinkedIn("https://linkedin.com/in/x".into());

        for (status, expect) in [
            (401, "Authentication failed"),
            (402, "Payment required"),
            (403, "Access forbidden"),
            (429, "Rate limit exceeded"),
        ] {
            let m = server
                .mock("GET", "/profiles")
                .match_query(Matcher::Any)
                .with_status(status)
                .create_async()
                .await;
            let err = client.fetch(&lookup).await.unwrap_err();
            assert!(err.to_string().contains(expect), "{status}: {err}");
            m.remove_async().await;
        }

        server
            .mock("GET", "/profiles")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let err = client.fetch(&lookup).await.unwrap_err();
        assert!(matches!(err, GenieError::NotFound(_)));
        assert!(err.to_string().contains("LinkedIn URL: https://linkedin.com/in/x"));
    }
}
