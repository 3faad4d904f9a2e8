//! Minimal FHIR R4 client for the preview-sandbox demos.
//!
//! FHIR schemas are the sandbox's contract, not ours; only the fragments the
//! demos consume are typed.

use serde::Deserialize;
use thiserror::Error;

pub const PREVIEW_FHIR_BASE: &str = "https://api.preview.platform.athenahealth.com/fhir/r4";
pub const PREVIEW_API_BASE: &str = "https://api.preview.platform.athenahealth.com";
pub const DEFAULT_PRACTICE: &str = "Organization/a-1.Practice-195900";
pub const DEFAULT_PRACTICE_ID: &str = "195900";

#[derive(Debug, Error)]
pub enum FhirError {
    #[error("FHIR request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("FHIR API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected FHIR response shape: {0}")]
    Shape(String),
}

/// Patient details for a demo create.
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub family: String,
    pub given: String,
    pub gender: String,
    pub birth_date: String,
}

/// The slice of a search bundle the demos consume.
#[derive(Debug, Deserialize)]
pub struct PatientSearch {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub entry: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SearchEntry {
    pub resource: PatientResource,
}

#[derive(Debug, Deserialize)]
pub struct PatientResource {
    pub id: String,
}

impl PatientSearch {
    /// Sandbox patient ids look like `a-1.E-10002`; the numeric tail is what
    /// the practice-scoped v1 API expects.
    pub fn first_patient_id(&self) -> Option<String> {
        let id = &self.entry.first()?.resource.id;
        Some(id.rsplit('.').next().unwrap_or(id).to_string())
    }
}

pub struct FhirClient {
    http: reqwest::Client,
    fhir_base: String,
    api_base: String,
    practice: String,
    practice_id: String,
}

impl FhirClient {
    /// Client bound to the preview sandbox practice.
    pub fn preview() -> Self {
        Self::new(
            PREVIEW_FHIR_BASE,
            PREVIEW_API_BASE,
            DEFAULT_PRACTICE,
            DEFAULT_PRACTICE_ID,
        )
    }

    pub fn new(
        fhir_base: impl Into<String>,
        api_base: impl Into<String>,
        practice: impl Into<String>,
        practice_id: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            fhir_base: fhir_base.into(),
            api_base: api_base.into(),
            practice: practice.into(),
            practice_id: practice_id.into(),
        }
    }

    /// FHIR R4 patient search, restricted to the configured practice.
    pub async fn search_patients(
        &self,
        token: &str,
        name: &str,
    ) -> Result<PatientSearch, FhirError> {
        let url = format!("{}/Patient", self.fhir_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("name", name), ("ah-practice", self.practice.as_str())])
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    /// Appointment list from the practice-scoped v1 API.
    pub async fn patient_appointments(
        &self,
        token: &str,
        patient_id: &str,
    ) -> Result<serde_json::Value, FhirError> {
        let url = format!(
            "{}/v1/{}/patients/{}/appointments",
            self.api_base, self.practice_id, patient_id
        );
        let response = self.http.get(&url).bearer_auth(token).send().await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    /// Create a patient through the R4 endpoint; returns the new resource id.
    pub async fn create_patient(
        &self,
        token: &str,
        patient: &NewPatient,
    ) -> Result<String, FhirError> {
        let url = format!("{}/Patient", self.fhir_base);
        let body = serde_json::json!({
            "resourceType": "Patient",
            "name": [{"family": patient.family, "given": [patient.given]}],
            "gender": patient.gender,
            "birthDate": patient.birth_date,
        });
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("Content-Type", "application/fhir+json")
            .json(&body)
            .send()
            .await?;
        let response = check(response).await?;

        let created: serde_json::Value = response.json().await?;
        created
            .get("id")
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .ok_or_else(|| FhirError::Shape("created patient has no id".to_string()))
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, FhirError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(FhirError::Api { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> FhirClient {
        FhirClient::new(
            format!("{}/fhir/r4", server.uri()),
            server.uri(),
            DEFAULT_PRACTICE,
            DEFAULT_PRACTICE_ID,
        )
    }

    #[tokio::test]
    async fn test_search_sends_bearer_token_and_practice() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fhir/r4/Patient"))
            .and(query_param("name", "smith"))
            .and(query_param("ah-practice", DEFAULT_PRACTICE))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resourceType": "Bundle",
                "total": 2,
                "entry": [
                    {"resource": {"id": "a-1.E-10002", "resourceType": "Patient"}},
                    {"resource": {"id": "a-1.E-10003", "resourceType": "Patient"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let search = client_for(&server)
            .search_patients("tok-1", "smith")
            .await
            .unwrap();

        assert_eq!(search.total, 2);
        assert_eq!(search.first_patient_id().as_deref(), Some("E-10002"));
    }

    #[tokio::test]
    async fn test_appointments_hit_the_practice_scoped_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/195900/patients/10002/appointments"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "appointments": [] })),
            )
            .mount(&server)
            .await;

        let appointments = client_for(&server)
            .patient_appointments("tok-1", "10002")
            .await
            .unwrap();

        assert!(appointments["appointments"].is_array());
    }

    #[tokio::test]
    async fn test_create_patient_returns_new_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fhir/r4/Patient"))
            .and(header("content-type", "application/fhir+json"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "resourceType": "Patient",
                "id": "a-1.E-20001"
            })))
            .mount(&server)
            .await;

        let patient = NewPatient {
            family: "Smith".to_string(),
            given: "John".to_string(),
            gender: "male".to_string(),
            birth_date: "1980-01-01".to_string(),
        };
        let id = client_for(&server)
            .create_patient("tok-1", &patient)
            .await
            .unwrap();

        assert_eq!(id, "a-1.E-20001");
    }

    #[tokio::test]
    async fn test_api_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired token"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .search_patients("stale", "smith")
            .await
            .unwrap_err();

        assert!(matches!(err, FhirError::Api { status: 401, .. }));
    }

    #[test]
    fn test_first_patient_id_strips_the_prefix() {
        let search = PatientSearch {
            total: 1,
            entry: vec![SearchEntry {
                resource: PatientResource {
                    id: "a-1.E-10002".to_string(),
                },
            }],
        };
        assert_eq!(search.first_patient_id().as_deref(), Some("E-10002"));

        let empty = PatientSearch {
            total: 0,
            entry: Vec::new(),
        };
        assert_eq!(empty.first_patient_id(), None);
    }
}
