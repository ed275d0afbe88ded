// src/config/allow_list.rs
//! Trusted-publisher allow-list for the search provider.
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "ALLOW_LIST_PATH";

/// Academic and public-health publishers the search provider is restricted to.
pub const BUILTIN_ALLOW_LIST: &[&str] = &[
    "ncbi.nlm.nih.gov",
    "sciencedirect.com",
    "nature.com",
    "nejm.org",
    "thelancet.com",
    "jamanetwork.com",
    "bmj.com",
    "wiley.com",
    "springer.com",
    "academic.oup.com",
    "cdc.gov",
    "who.int",
    "harvard.edu",
    "mayoclinic.org",
    "clevelandclinic.org",
];

pub fn builtin_allow_list() -> Vec<String> {
    BUILTIN_ALLOW_LIST.iter().map(|s| s.to_string()).collect()
}

const DEFAULT_TOML_PATH: &str = "config/allow_list.toml";
const DEFAULT_JSON_PATH: &str = "config/allow_list.json";

#[derive(Deserialize)]
struct AllowListFile {
    sources: Vec<String>,
}

/// Read an allow-list file: TOML `sources = [...]` or a bare JSON array of domains.
///
/// The extension picks the first format tried; the other is the fallback.
pub fn load_allow_list_from(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading allow-list from {}", path.display()))?;
    let json_first = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let domains = parse_allow_list(&content, json_first)
        .with_context(|| format!("parsing allow-list {}", path.display()))?;
    tracing::debug!(target: "search", path = %path.display(), domains = domains.len(), "allow-list loaded");
    Ok(domains)
}

/// `$ALLOW_LIST_PATH`, else `config/allow_list.toml`, else `config/allow_list.json`,
/// else [`BUILTIN_ALLOW_LIST`]. A set but missing env path is an error.
pub fn load_allow_list_default() -> Result<Vec<String>> {
    if let Some(raw) = std::env::var_os(ENV_PATH) {
        let explicit = PathBuf::from(raw);
        if !explicit.is_file() {
            return Err(anyhow!("{ENV_PATH} points to {}, which does not exist", explicit.display()));
        }
        return load_allow_list_from(&explicit);
    }
    match [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH]
        .iter()
        .map(Path::new)
        .find(|p| p.is_file())
    {
        Some(found) => load_allow_list_from(found),
        None => Ok(builtin_allow_list()),
    }
}

fn parse_allow_list(content: &str, json_first: bool) -> Result<Vec<String>> {
    let from_toml = || {
        toml::from_str::<AllowListFile>(content)
            .map(|f| f.sources)
            .map_err(anyhow::Error::from)
    };
    let from_json = || serde_json::from_str::<Vec<String>>(content).map_err(anyhow::Error::from);

    let raw = if json_first {
        from_json().or_else(|_| from_toml())
    } else {
        from_toml().or_else(|_| from_json())
    }
    .map_err(|_| anyhow!("allow-list is neither `sources = [...]` TOML nor a JSON array"))?;

    let domains = normalize_domains(raw);
    // An empty list would lift the provider restriction entirely.
    if domains.is_empty() {
        return Err(anyhow!("allow-list is empty"));
    }
    Ok(domains)
}

/// Trimmed, lower-cased, trailing-slash-free, deduplicated and sorted.
fn normalize_domains(raw: Vec<String>) -> Vec<String> {
    raw.iter()
        .map(|d| d.trim().trim_end_matches('/').to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// True when `host` equals an allow-listed domain or is a subdomain of one.
pub fn host_allowed(host: &str, allow_list: &[String]) -> bool {
    let h = host.trim_end_matches('.').to_ascii_lowercase();
    allow_list.iter().any(|d| {
        let d = d.as_str();
        h == d || (h.len() > d.len() && h.ends_with(d) && h.as_bytes()[h.len() - d.len() - 1] == b'.')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn both_formats_are_normalized() {
        let toml = r#"sources = [" WHO.int ", "", "cdc.gov", "cdc.gov"]"#;
        let json = r#"["bmj.com/", "  nature.com  ", ""]"#;
        assert_eq!(parse_allow_list(toml, false).unwrap(), vec!["cdc.gov", "who.int"]);
        assert_eq!(parse_allow_list(json, false).unwrap(), vec!["bmj.com", "nature.com"]);
        assert_eq!(parse_allow_list(json, true).unwrap(), vec!["bmj.com", "nature.com"]);
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(parse_allow_list(r#"sources = []"#, false).is_err());
        assert!(parse_allow_list("[]", true).is_err());
        assert!(parse_allow_list("not a list", false).is_err());
    }

    #[test]
    fn subdomains_match_but_lookalikes_do_not() {
        let al = vec!["nih.gov".to_string(), "who.int".to_string()];
        assert!(host_allowed("nih.gov", &al));
        assert!(host_allowed("www.ncbi.NLM.nih.gov", &al));
        assert!(host_allowed("who.int.", &al));
        assert!(!host_allowed("evilnih.gov", &al));
        assert!(!host_allowed("nih.gov.evil.com", &al));
    }

    #[serial_test::serial]
    #[test]
    fn resolution_order_env_file_builtin() {
        let original_cwd = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_PATH);

        // empty working dir: built-in list
        assert_eq!(load_allow_list_default().unwrap().len(), BUILTIN_ALLOW_LIST.len());

        fs::create_dir("config").unwrap();
        fs::write("config/allow_list.json", r#"["nejm.org"]"#).unwrap();
        assert_eq!(load_allow_list_default().unwrap(), vec!["nejm.org"]);

        fs::write("config/allow_list.toml", r#"sources = ["bmj.com"]"#).unwrap();
        assert_eq!(load_allow_list_default().unwrap(), vec!["bmj.com"]);

        let custom = tmp.path().join("trusted.json");
        fs::write(&custom, r#"["example.org"]"#).unwrap();
        env::set_var(ENV_PATH, &custom);
        assert_eq!(load_allow_list_default().unwrap(), vec!["example.org"]);

        env::set_var(ENV_PATH, tmp.path().join("missing.toml"));
        assert!(load_allow_list_default().is_err());

        env::remove_var(ENV_PATH);
        env::set_current_dir(&original_cwd).unwrap();
    }
}
