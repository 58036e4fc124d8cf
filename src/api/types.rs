use serde::Deserialize;

/// Account profile and quota, from `GET api2/account/info/`.
/// A negative `total` means the server imposes no quota.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    pub email: String,
    #[serde(default)]
    pub usage: i64,
    #[serde(default)]
    pub total: i64,
}

/// One library from the `GET api2/repos/` listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Repo {
    pub id: String,
    pub name: String,
}

/// Response of `POST api2/repos/`. Fields default to empty so a partial
/// server response surfaces as a name/id mismatch instead of a parse error.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedRepo {
    #[serde(default)]
    pub repo_id: String,
    #[serde(default)]
    pub repo_name: String,
}

/// A directory listing entry from `GET api2/repos/<id>/dir/`.
#[derive(Debug, Clone, Deserialize)]
pub struct DirEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: String,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.entry_type == "dir"
    }
}
