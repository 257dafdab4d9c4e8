use std::{
    collections::BTreeMap,
    env,
    fs::File,
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Credential, ServerConfig};

/// An error encountered while loading or resolving a configuration profile.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to load config file")]
    Io(#[from] io::Error),
    #[error("Invalid configuration")]
    Invalid(#[from] serde_yaml::Error),
    #[error("Profile '{0}' not found")]
    ProfileNotFound(String),
    #[error("No host configured")]
    NoHost,
    #[error("Invalid host")]
    InvalidHost(#[from] http::uri::InvalidUri),
}

/// A fully resolved configuration profile: where a Data API server lives,
/// and how to log in to it.
#[derive(Clone, Serialize)]
pub struct Profile {
    /// The name of the profile.
    pub name: String,
    /// The server authority, e.g. `fm.example.com` or `10.0.0.5:8443`.
    pub host: String,
    /// The URI scheme. Defaults to `https`.
    pub scheme: String,
    /// The API version segment. Defaults to `/vLatest`.
    pub version: String,
    /// The path the API is mounted at. Defaults to `/fmi/data`.
    pub root_path: String,
    /// The database to add to the server, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// The account name for basic authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// The account password for basic authentication.
    #[serde(skip)]
    pub password: Option<String>,
    /// A Claris ID token. Preferred over basic authentication when set.
    #[serde(skip)]
    pub claris_id: Option<String>,
    /// The user-agent used on requests.
    #[serde(skip)]
    pub user_agent: String,
    /// The config file this profile was loaded from, or the canonical one if
    /// no config file exists.
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("scheme", &self.scheme)
            .field("version", &self.version)
            .field("root_path", &self.root_path)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("claris_id", &self.claris_id.as_ref().map(|_| "********"))
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// A profile stored in the config file.
#[derive(Debug, Default, Clone, Deserialize)]
struct ConfigProfile {
    host: Option<String>,
    scheme: Option<String>,
    version: Option<String>,
    root_path: Option<String>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    claris_id: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct Config {
    profiles: BTreeMap<String, ConfigProfile>,
}

/// Values taken from the environment, which win over the config file.
#[derive(Debug, Default)]
struct Overrides {
    host: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl Overrides {
    fn from_env() -> Self {
        Self {
            host: env::var("FMDATA_HOST").ok(),
            username: env::var("FMDATA_USERNAME").ok(),
            password: env::var("FMDATA_PASSWORD").ok(),
        }
    }

    fn apply(self, profile: &mut ConfigProfile) {
        if self.host.is_some() {
            profile.host = self.host;
        }

        if self.username.is_some() {
            profile.username = self.username;
        }

        if self.password.is_some() {
            profile.password = self.password;
        }
    }
}

impl Profile {
    /// Load the selected profile from the configuration file (usually
    /// ~/.config/fmdata.yaml). If no configuration file is present, then the
    /// configuration will be loaded solely from the environment.
    ///
    /// If `FMDATA_PROFILE` is set, that will be used to select the profile.
    /// Otherwise the profile `default` will be used.
    pub fn from_default_env() -> Result<Self, Error> {
        if let Ok(s) = env::var("FMDATA_PROFILE") {
            Self::from_env(&s)
        } else {
            Self::from_env("default")
        }
    }

    /// Load the given profile from the configuration file (usually
    /// ~/.config/fmdata.yaml). If no configuration file is present, then the
    /// configuration will be loaded solely from the environment.
    ///
    /// The following environment variables override the corresponding
    /// values in the config file:
    ///
    /// | Environment Variable | Config Value |
    /// |----------------------|--------------|
    /// | `FMDATA_HOST`        | `host`       |
    /// | `FMDATA_USERNAME`    | `username`   |
    /// | `FMDATA_PASSWORD`    | `password`   |
    pub fn from_env(name: &str) -> Result<Self, Error> {
        let config_path = find_config()?;
        Self::resolve(&config_path, name, Overrides::from_env())
    }

    fn resolve(config_path: &Path, name: &str, overrides: Overrides) -> Result<Self, Error> {
        let mut profile = match read_profile(config_path, name) {
            Ok(p) => p,
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no config file found");
                Default::default()
            }
            Err(e) => return Err(e),
        };

        overrides.apply(&mut profile);
        Self::from_raw(profile, name.to_owned(), config_path.to_owned())
    }

    /// Modifies the user-agent to have a different product prefix.
    pub fn with_ua_product(self, ua_product: &str) -> Self {
        Self {
            user_agent: make_ua(Some(ua_product)),
            ..self
        }
    }

    /// Load the given profile (or 'default') from the configuration file
    /// (usually ~/.config/fmdata.yaml). Does not read any environment
    /// variables.
    ///
    /// Usually, you will want to use [Profile::from_env] instead.
    pub fn load(name: Option<&str>) -> Result<Self, Error> {
        let file = find_config()?;
        Self::read(&file, name)
    }

    /// Iterate through all profiles in the configuration file (usually
    /// ~/.config/fmdata.yaml). Does not read any environment variables.
    pub fn load_all() -> Result<impl Iterator<Item = Self>, Error> {
        let path = find_config()?;
        Self::read_all(path)
    }

    /// Load the given profile (or 'default') from the given file. Does not
    /// read any environment variables.
    pub fn read(path: impl AsRef<Path>, name: Option<&str>) -> Result<Self, Error> {
        let path = path.as_ref();
        let name = name.unwrap_or("default").to_owned();
        let profile = read_profile(path, &name)?;
        Self::from_raw(profile, name, path.to_owned())
    }

    /// Read all profiles from the given file. Does not read any environment
    /// variables.
    pub fn read_all(path: impl AsRef<Path>) -> Result<impl Iterator<Item = Self>, Error> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;

        let profiles: Result<Vec<_>, Error> = config
            .profiles
            .into_iter()
            .map(|(name, raw)| Profile::from_raw(raw, name, path.to_owned()))
            .collect();

        Ok(profiles?.into_iter())
    }

    /// The address configuration for a [`Server`](crate::Server).
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            scheme: self.scheme.clone(),
            version: self.version.clone(),
            root_path: self.root_path.clone(),
            user_agent: self.user_agent.clone(),
        }
    }

    /// The login credential described by this profile: a Claris ID if set,
    /// otherwise basic authentication if a username is set, otherwise
    /// [`Credential::Invalid`].
    pub fn credential(&self) -> Credential {
        if let Some(token) = &self.claris_id {
            return Credential::claris_id(token.clone());
        }

        match &self.username {
            Some(username) => {
                Credential::basic(username, self.password.as_deref().unwrap_or_default())
            }
            None => Credential::Invalid,
        }
    }

    fn from_raw(raw: ConfigProfile, name: String, path: PathBuf) -> Result<Self, Error> {
        let ConfigProfile {
            host,
            scheme,
            version,
            root_path,
            database,
            username,
            password,
            claris_id,
        } = raw;

        let Some(host) = host else {
            return Err(Error::NoHost);
        };

        let authority: http::uri::Authority = host.parse()?;
        let defaults = ServerConfig::default();

        Ok(Self {
            name,
            host: authority.to_string(),
            scheme: scheme.unwrap_or(defaults.scheme),
            version: version.unwrap_or(defaults.version),
            root_path: root_path.unwrap_or(defaults.root_path),
            database,
            username,
            password,
            claris_id,
            user_agent: defaults.user_agent,
            config_path: path,
        })
    }
}

fn find_config() -> Result<PathBuf, Error> {
    let Some(home) = env::home_dir() else {
        return Err(Error::Io(io::Error::other(
            "No $HOME found for the current user",
        )));
    };

    let canonical = home.join(".config/fmdata.yaml");
    if canonical.exists() {
        return Ok(canonical);
    }

    // Try some fallback paths, and if that doesn't work, return the error from
    // the canonical location.
    for fallback in [
        ".config/fmdata.yml",
        ".fmdata/config.yaml",
        ".fmdata/config.yml",
    ] {
        let path = home.join(fallback);
        if path.exists() {
            return Ok(path);
        }
    }

    Ok(canonical)
}

fn read_profile(p: &Path, name: &str) -> Result<ConfigProfile, Error> {
    let file = File::open(p)?;
    let mut config: Config = serde_yaml::from_reader(file).map_err(Error::Invalid)?;
    let Some(config_profile) = config.profiles.remove(name) else {
        return Err(Error::ProfileNotFound(name.to_string()));
    };

    debug!(path = %p.display(), profile = name, "loaded config file");

    Ok(config_profile)
}

pub(crate) fn make_ua(product: Option<&str>) -> String {
    format!(
        "{}/{}",
        product.unwrap_or("fmdata"),
        env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
mod test {
    use std::io::Write as _;

    use assert_matches::assert_matches;

    use super::*;

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const CONFIG: &str = "
profiles:
  default:
    host: fm.example.com
    database: Contacts
    username: admin
    password: hunter2
  staging:
    host: 10.0.0.5:8443
    scheme: http
    version: /v2
    claris_id: abc
  broken:
    database: Contacts
";

    #[test]
    fn read_default_profile() -> anyhow::Result<()> {
        let file = config_file(CONFIG);
        let profile = Profile::read(file.path(), None)?;

        assert_eq!(profile.name, "default");
        assert_eq!(profile.host, "fm.example.com");
        assert_eq!(profile.database.as_deref(), Some("Contacts"));
        assert_eq!(profile.credential(), Credential::basic("admin", "hunter2"));

        let config = profile.server_config();
        assert_eq!(config.scheme, "https");
        assert_eq!(config.version, "/vLatest");
        assert_eq!(config.root_path, "/fmi/data");
        Ok(())
    }

    #[test]
    fn claris_id_wins() -> anyhow::Result<()> {
        let file = config_file(CONFIG);
        let profile = Profile::read(file.path(), Some("staging"))?;

        assert_eq!(profile.host, "10.0.0.5:8443");
        assert_eq!(profile.server_config().scheme, "http");
        assert_eq!(profile.server_config().version, "/v2");
        assert_eq!(profile.credential(), Credential::claris_id("abc"));
        Ok(())
    }

    #[test]
    fn missing_host_and_profile() {
        let file = config_file(CONFIG);
        assert_matches!(
            Profile::read(file.path(), Some("broken")),
            Err(Error::NoHost)
        );
        assert_matches!(
            Profile::read(file.path(), Some("nope")),
            Err(Error::ProfileNotFound(name)) if name == "nope"
        );
    }

    #[test]
    fn invalid_host() {
        let file = config_file("profiles:\n  default:\n    host: 'not a host/path'\n");
        assert_matches!(
            Profile::read(file.path(), None),
            Err(Error::InvalidHost(_))
        );
    }

    #[test]
    fn overrides_win() -> anyhow::Result<()> {
        let file = config_file(CONFIG);
        let overrides = Overrides {
            host: Some("other.example.com".into()),
            username: None,
            password: Some("changed".into()),
        };

        let profile = Profile::resolve(file.path(), "default", overrides)?;
        assert_eq!(profile.host, "other.example.com");
        assert_eq!(profile.credential(), Credential::basic("admin", "changed"));
        Ok(())
    }

    #[test]
    fn environment_only() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("fmdata.yaml");
        let overrides = Overrides {
            host: Some("fm.example.com".into()),
            username: Some("web".into()),
            password: Some("pw".into()),
        };

        let profile = Profile::resolve(&missing, "default", overrides)?;
        assert_eq!(profile.host, "fm.example.com");
        assert_eq!(profile.database, None);
        assert_eq!(profile.credential(), Credential::basic("web", "pw"));

        let result = Profile::resolve(&missing, "default", Overrides::default());
        assert_matches!(result, Err(Error::NoHost));
        Ok(())
    }

    #[test]
    fn read_all_profiles() -> anyhow::Result<()> {
        let file = config_file(
            "profiles:\n  a:\n    host: a.example.com\n  b:\n    host: b.example.com\n",
        );
        let names: Vec<_> = Profile::read_all(file.path())?.map(|p| p.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        Ok(())
    }

    #[test]
    fn debug_redacts_secrets() -> anyhow::Result<()> {
        let file = config_file(CONFIG);
        let profile = Profile::read(file.path(), None)?;
        let debug = format!("{profile:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("********"));
        Ok(())
    }
}
