//! # Run Options
//!
//! Immutable configuration of one acquisition run. Tasks receive the options as
//! an `Arc<AcquisitionOptions>`; the post-acquisition chain derives augmented
//! copies (`with_content_directory`, `with_pdf_filename`) between stages instead
//! of mutating a shared bag.

use crate::constants::artifacts;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of evidence the run captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionType {
    Web,
    EntireWebsite,
    Email,
    Instagram,
    Video,
    Other,
}

impl AcquisitionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::EntireWebsite => "entire_website",
            Self::Email => "email",
            Self::Instagram => "instagram",
            Self::Video => "video",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for AcquisitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AcquisitionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(Self::Web),
            "entire_website" => Ok(Self::EntireWebsite),
            "email" => Ok(Self::Email),
            "instagram" => Ok(Self::Instagram),
            "video" => Ok(Self::Video),
            "other" => Ok(Self::Other),
            _ => Err(format!("Invalid acquisition type: {s}")),
        }
    }
}

impl Default for AcquisitionType {
    fn default() -> Self {
        Self::Web
    }
}

/// Case metadata persisted to `caseinfo.json` and printed on the report front page.
///
/// `logo_bin` stays binary in memory; only its JSON form is base64.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseInfo {
    pub name: String,
    pub lawyer_name: String,
    pub operator: String,
    pub proceeding_type: Option<u32>,
    pub courthouse: String,
    pub proceeding_number: String,
    pub notes: String,
    pub logo: String,
    #[serde(serialize_with = "serialize_logo", deserialize_with = "deserialize_logo")]
    pub logo_bin: Option<Vec<u8>>,
    pub logo_height: Option<u32>,
    pub logo_width: Option<u32>,
    /// Fields this crate does not interpret, kept for round-tripping
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn serialize_logo<S: Serializer>(logo: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
    match logo {
        Some(bytes) if !bytes.is_empty() => serializer.serialize_some(&STANDARD.encode(bytes)),
        _ => serializer.serialize_none(),
    }
}

fn deserialize_logo<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
    let encoded: Option<String> = Option::deserialize(deserializer)?;
    match encoded {
        Some(s) if !s.is_empty() => STANDARD
            .decode(s.as_bytes())
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

/// Options shared by every task of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionOptions {
    pub acquisition_directory: PathBuf,
    #[serde(rename = "type")]
    pub acquisition_type: AcquisitionType,
    #[serde(default)]
    pub case_info: CaseInfo,
    #[serde(default)]
    pub url: Option<String>,
    /// Instagram profile folder
    #[serde(default)]
    pub profile_dir: Option<PathBuf>,
    /// Video download folder
    #[serde(default)]
    pub url_dir: Option<PathBuf>,
    /// File names the hash stage skips in addition to its own report and the log
    #[serde(default, rename = "exclude_list")]
    pub exclude_from_hash_calculation: Vec<String>,
    #[serde(default)]
    pub acquisition_content_directory: Option<PathBuf>,
    #[serde(default)]
    pub pdf_filename: Option<String>,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl AcquisitionOptions {
    pub fn new(acquisition_directory: impl Into<PathBuf>, acquisition_type: AcquisitionType) -> Self {
        Self {
            acquisition_directory: acquisition_directory.into(),
            acquisition_type,
            case_info: CaseInfo::default(),
            url: None,
            profile_dir: None,
            url_dir: None,
            exclude_from_hash_calculation: Vec::new(),
            acquisition_content_directory: None,
            pdf_filename: None,
            extra: HashMap::new(),
        }
    }

    pub fn with_case_info(mut self, case_info: CaseInfo) -> Self {
        self.case_info = case_info;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_profile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profile_dir = Some(dir.into());
        self
    }

    pub fn with_url_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.url_dir = Some(dir.into());
        self
    }

    pub fn with_hash_exclusions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_from_hash_calculation
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Folder the zip stage archives for this acquisition type, if any
    pub fn content_directory_for_type(&self) -> Option<PathBuf> {
        match self.acquisition_type {
            AcquisitionType::Web | AcquisitionType::EntireWebsite => {
                Some(self.acquisition_directory.join(artifacts::WEB_CONTENT_DIR))
            }
            AcquisitionType::Email => {
                Some(self.acquisition_directory.join(artifacts::MAIL_CONTENT_DIR))
            }
            AcquisitionType::Instagram => self.profile_dir.clone(),
            AcquisitionType::Video => self.url_dir.clone(),
            AcquisitionType::Other => None,
        }
    }

    /// Copy with `acquisition_content_directory` resolved from the acquisition type
    pub fn with_content_directory(&self) -> Self {
        Self {
            acquisition_content_directory: self.content_directory_for_type(),
            ..self.clone()
        }
    }

    /// Copy with the report file name set
    pub fn with_pdf_filename(&self, filename: impl Into<String>) -> Self {
        Self {
            pdf_filename: Some(filename.into()),
            ..self.clone()
        }
    }

    pub fn pdf_filename(&self) -> &str {
        self.pdf_filename.as_deref().unwrap_or(artifacts::REPORT_PDF)
    }

    pub fn artifact_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.acquisition_directory.join(name)
    }

    /// Host part of `url`, if present and parseable
    pub fn url_host(&self) -> Option<String> {
        let url = self.url.as_deref()?;
        let parsed = reqwest::Url::parse(url)
            .or_else(|_| reqwest::Url::parse(&format!("http://{url}")))
            .ok()?;
        parsed.host_str().map(str::to_string)
    }
}
