use crate::classifier::DataType;
use crate::config::WatcherConfig;
use serde::Serialize;

const JOB_TYPE_INGEST: &str = "ingest";
const LOCATION_TYPE_S3: &str = "s3";
const DESCRIPTION: &str = "Ingested automatically by FileWatcher.";
const CLASSIFICATION: &str = "unclassified";

/// Body of a `POST /job` ingest request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestJobRequest {
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(rename = "jobType")]
    pub job_type: JobType,
}

/// Who the job is submitted as
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Identity {
    #[serde(rename = "apiKey")]
    ApiKey(String),
    #[serde(rename = "userName")]
    UserName(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobType {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub host: bool,
    pub data: JobData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobData {
    #[serde(rename = "dataType")]
    pub data_type: DataTypeSpec,
    pub metadata: JobMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataTypeSpec {
    #[serde(rename = "type")]
    pub kind: DataType,
    pub location: FileLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileLocation {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub bucket_name: String,
    pub file_name: String,
    pub domain_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobMetadata {
    pub description: &'static str,
    #[serde(rename = "classType")]
    pub class_type: ClassType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassType {
    pub classification: &'static str,
}

impl IngestJobRequest {
    /// Object key the gateway will fetch
    pub fn file_name(&self) -> &str {
        &self.job_type.data.data_type.location.file_name
    }

    pub fn data_type(&self) -> DataType {
        self.job_type.data.data_type.kind
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Builds ingest job documents from the static watcher configuration
#[derive(Debug, Clone)]
pub struct JobPayloadBuilder {
    bucket: String,
    domain_name: String,
    identity: Identity,
}

impl JobPayloadBuilder {
    pub fn new(config: &WatcherConfig) -> Self {
        let identity = match config.gateway.user_name {
            Some(ref user_name) => Identity::UserName(user_name.clone()),
            None => Identity::ApiKey(config.gateway.api_key.clone().unwrap_or_default()),
        };

        Self {
            bucket: config.storage.bucket.clone(),
            domain_name: config.storage.domain_name.clone(),
            identity,
        }
    }

    /// Build the job for a file; unrecognized files have no job.
    pub fn build(&self, file_name: &str, data_type: DataType) -> Option<IngestJobRequest> {
        if !data_type.is_recognized() {
            return None;
        }

        Some(IngestJobRequest {
            identity: self.identity.clone(),
            job_type: JobType {
                kind: JOB_TYPE_INGEST,
                host: false,
                data: JobData {
                    data_type: DataTypeSpec {
                        kind: data_type,
                        location: FileLocation {
                            kind: LOCATION_TYPE_S3,
                            bucket_name: self.bucket.clone(),
                            file_name: file_name.to_string(),
                            domain_name: self.domain_name.clone(),
                        },
                    },
                    metadata: JobMetadata {
                        description: DESCRIPTION,
                        class_type: ClassType {
                            classification: CLASSIFICATION,
                        },
                    },
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config() -> WatcherConfig {
        let mut config = WatcherConfig::default();
        config.storage.bucket = "uploads".to_string();
        config.gateway.api_key = Some("secret-key".to_string());
        config
    }

    #[test]
    fn test_payload_shape() {
        let builder = JobPayloadBuilder::new(&test_config());
        let request = builder.build("scan1.tif", DataType::Raster).unwrap();

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "apiKey": "secret-key",
                "jobType": {
                    "type": "ingest",
                    "host": false,
                    "data": {
                        "dataType": {
                            "type": "raster",
                            "location": {
                                "type": "s3",
                                "bucketName": "uploads",
                                "fileName": "scan1.tif",
                                "domainName": "s3.amazonaws.com"
                            }
                        },
                        "metadata": {
                            "description": "Ingested automatically by FileWatcher.",
                            "classType": { "classification": "unclassified" }
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_file_name_is_the_candidate() {
        let builder = JobPayloadBuilder::new(&test_config());
        let request = builder
            .build("surveys/2024/cloud1.laz", DataType::Pointcloud)
            .unwrap();

        assert_eq!(request.file_name(), "surveys/2024/cloud1.laz");
        assert_eq!(request.data_type(), DataType::Pointcloud);
    }

    #[test]
    fn test_unrecognized_has_no_job() {
        let builder = JobPayloadBuilder::new(&test_config());
        assert!(builder.build("readme.txt", DataType::Unrecognized).is_none());
    }

    #[test]
    fn test_user_name_identity() {
        let mut config = test_config();
        config.gateway.user_name = Some("watcher".to_string());

        let request = JobPayloadBuilder::new(&config)
            .build("roads.zip", DataType::Shapefile)
            .unwrap();
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["userName"], "watcher");
        assert!(value.get("apiKey").is_none());
        assert_eq!(value["jobType"]["data"]["dataType"]["type"], "shapefile");
    }

    #[test]
    fn test_missing_api_key_is_empty() {
        let mut config = test_config();
        config.gateway.api_key = None;

        let request = JobPayloadBuilder::new(&config)
            .build("scan1.tif", DataType::Raster)
            .unwrap();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["apiKey"], "");
    }
}
