//! HTTP surface for Warden.
//!
//! Exposes an axum [`Router`] whose protected routes run a per-route guard
//! chain (authentication, rate limiting, role, scope, ownership, activity
//! logging) in front of thin JSON handlers, backed by any [`Store`].

pub mod activity;
pub mod credential;
pub mod error;
pub mod guard;
pub mod handlers;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  middleware::{from_fn, from_fn_with_state},
  routing::get,
};
use chrono::TimeDelta;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use warden_core::{
  Role,
  ratelimit::{RateLimiter, RateLimits},
  resource::ResourceKind,
  store::{ActivityStore, ResourceStore, UserStore},
};

use activity::{ActivityGate, ActivityRecorder, describe_class_view, describe_submission_view};
use credential::CredentialValidator;
use guard::{OwnershipGate, RoleGate};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `warden.toml` and
/// `WARDEN_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                 String,
  #[serde(default = "default_port")]
  pub port:                 u16,
  #[serde(default = "default_store_path")]
  pub store_path:           PathBuf,
  /// Shared HS256 secret for bearer tokens.
  pub jwt_secret:           String,
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
  /// Answer ownership denials with the not-found response.
  #[serde(default)]
  pub mask_denials:         bool,
  /// Capacity of the activity queue.
  #[serde(default = "default_activity_queue")]
  pub activity_queue:       usize,
  #[serde(default)]
  pub rate_limit:           RateLimitSettings,
}

impl ServerConfig {
  /// All defaults, with the given token secret.
  pub fn new(jwt_secret: impl Into<String>) -> Self {
    Self {
      host:                 default_host(),
      port:                 default_port(),
      store_path:           default_store_path(),
      jwt_secret:           jwt_secret.into(),
      request_timeout_secs: default_request_timeout(),
      mask_denials:         false,
      activity_queue:       default_activity_queue(),
      rate_limit:           RateLimitSettings::default(),
    }
  }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitSettings {
  pub window_secs:         u64,
  pub student:             u32,
  pub lecturer:            u32,
  pub prl:                 u32,
  pub program_leader:      u32,
  /// How often idle windows are dropped.
  pub sweep_interval_secs: u64,
}

impl Default for RateLimitSettings {
  fn default() -> Self {
    let limits = RateLimits::default();
    Self {
      window_secs:         limits.window.num_seconds().unsigned_abs(),
      student:             limits.student,
      lecturer:            limits.lecturer,
      prl:                 limits.prl,
      program_leader:      limits.program_leader,
      sweep_interval_secs: 60,
    }
  }
}

impl RateLimitSettings {
  pub fn limits(&self) -> RateLimits {
    RateLimits {
      window:         window_from_secs(self.window_secs),
      student:        self.student,
      lecturer:       self.lecturer,
      prl:            self.prl,
      program_leader: self.program_leader,
    }
  }
}

/// Windows too long to represent saturate at the largest delta.
fn window_from_secs(secs: u64) -> TimeDelta {
  i64::try_from(secs)
    .ok()
    .and_then(TimeDelta::try_seconds)
    .unwrap_or(TimeDelta::MAX)
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/warden/warden.db") }

fn default_request_timeout() -> u64 { 30 }

fn default_activity_queue() -> usize { 1024 }

// ─── Application state ────────────────────────────────────────────────────────

/// Everything the routes need from a storage backend.
pub trait Store: UserStore + ResourceStore + ActivityStore + Clone + 'static {}

impl<T> Store for T where T: UserStore + ResourceStore + ActivityStore + Clone + 'static {}

/// Shared state threaded through all guards and handlers.
#[derive(Clone)]
pub struct AppState<S> {
  pub store:       Arc<S>,
  pub config:      Arc<ServerConfig>,
  pub credentials: Arc<CredentialValidator>,
  pub limiter:     Arc<RateLimiter>,
  pub activity:    ActivityRecorder,
}

impl<S: Store> AppState<S> {
  /// Build the state and start the activity worker. The worker finishes
  /// once every clone of the state has been dropped.
  pub fn new(store: S, config: ServerConfig) -> (Self, JoinHandle<()>) {
    let store = Arc::new(store);
    let (activity, worker) = ActivityRecorder::spawn(Arc::clone(&store), config.activity_queue);
    let state = Self {
      credentials: Arc::new(CredentialValidator::new(&config.jwt_secret)),
      limiter: Arc::new(RateLimiter::new(config.rate_limit.limits())),
      config: Arc::new(config),
      store,
      activity,
    };
    (state, worker)
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

const STAFF: &[Role] = &[Role::Lecturer, Role::Prl, Role::ProgramLeader];
const EVERYONE: &[Role] = &Role::ALL;

/// Build the axum [`Router`] for the Warden API.
pub fn router<S: Store>(state: AppState<S>) -> Router {
  let timeout = Duration::from_secs(state.config.request_timeout_secs);

  let auth = from_fn_with_state(state.clone(), guard::require_auth::<S>);
  let rate = from_fn_with_state(state.clone(), guard::rate_limited::<S>);
  let owns = |kind| {
    from_fn_with_state(OwnershipGate { state: state.clone(), kind }, guard::require_ownership::<S>)
  };
  let role = |allowed| from_fn_with_state(RoleGate { allowed }, guard::require_role);
  let logs = |action, describe: activity::Describer| {
    from_fn_with_state(
      ActivityGate::new(state.activity.clone(), action, describe),
      activity::with_activity_log,
    )
  };

  Router::new()
    .route("/health", get(handlers::health))
    .route(
      "/api/me",
      get(handlers::me::handler).layer(
        ServiceBuilder::new().layer(auth.clone()).layer(rate.clone()),
      ),
    )
    .route(
      "/api/courses",
      get(handlers::courses::handler::<S>).layer(
        ServiceBuilder::new()
          .layer(auth.clone())
          .layer(rate.clone())
          .layer(role(STAFF))
          .layer(from_fn(guard::require_faculty_scope)),
      ),
    )
    .route(
      "/api/courses/{id}",
      get(handlers::resource::handler).layer(
        ServiceBuilder::new()
          .layer(auth.clone())
          .layer(rate.clone())
          .layer(owns(ResourceKind::Course)),
      ),
    )
    .route(
      "/api/classes/{id}",
      get(handlers::resource::handler).layer(
        ServiceBuilder::new()
          .layer(auth.clone())
          .layer(rate.clone())
          .layer(owns(ResourceKind::Class))
          .layer(logs("view_class", Arc::new(describe_class_view))),
      ),
    )
    .route(
      "/api/assignments/{id}",
      get(handlers::resource::handler).layer(
        ServiceBuilder::new()
          .layer(auth.clone())
          .layer(rate.clone())
          .layer(owns(ResourceKind::Assignment)),
      ),
    )
    .route(
      "/api/submissions/{id}",
      get(handlers::resource::handler).layer(
        ServiceBuilder::new()
          .layer(auth.clone())
          .layer(rate.clone())
          .layer(role(EVERYONE))
          .layer(owns(ResourceKind::Submission))
          .layer(logs("view_submission", Arc::new(describe_submission_view))),
      ),
    )
    .route(
      "/api/users/{id}",
      get(handlers::resource::handler).layer(
        ServiceBuilder::new()
          .layer(auth)
          .layer(rate)
          .layer(owns(ResourceKind::User)),
      ),
    )
    .layer(TimeoutLayer::new(timeout))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use chrono::Utc;
  use serde_json::Value;
  use tower::ServiceExt as _;
  use uuid::Uuid;
  use warden_core::{
    resource::{Assignment, Class, Course, EnrollmentStatus, Submission, UserProfile},
    store::{ActivityRecord, NewActivity},
    subject::{AccountStatus, UserRecord},
  };
  use warden_store_sqlite::SqliteStore;

  use crate::credential::TokenIssuer;

  const SECRET: &str = "test-secret";

  struct Fixture {
    store:  SqliteStore,
    state:  AppState<SqliteStore>,
    worker: JoinHandle<()>,
    issuer: TokenIssuer,
  }

  async fn fixture_with(config: ServerConfig) -> Fixture {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let (state, worker) = AppState::new(store.clone(), config);
    Fixture {
      store,
      state,
      worker,
      issuer: TokenIssuer::new(SECRET, TimeDelta::hours(1)),
    }
  }

  async fn fixture() -> Fixture { fixture_with(ServerConfig::new(SECRET)).await }

  impl Fixture {
    async fn user(&self, username: &str, role: Option<&str>, faculty: Option<&str>) -> UserRecord {
      let user = UserRecord {
        id:           Uuid::new_v4(),
        username:     username.into(),
        email:        None,
        role:         role.map(str::to_owned),
        faculty_name: faculty.map(str::to_owned),
        department:   None,
        status:       AccountStatus::Active,
      };
      self.store.insert_user(&user).await.unwrap();
      user
    }

    async fn course(&self, code: &str, faculty: &str, lecturer: Option<Uuid>) -> Course {
      let course = Course {
        id:           Uuid::new_v4(),
        code:         code.into(),
        name:         format!("{code} course"),
        faculty_name: Some(faculty.into()),
        lecturer_id:  lecturer,
      };
      self.store.insert_course(&course).await.unwrap();
      course
    }

    async fn class(&self, course: &Course, lecturer: Option<Uuid>) -> Class {
      let class = Class {
        id:          Uuid::new_v4(),
        course_id:   course.id,
        lecturer_id: lecturer,
        name:        "Tuesday lab".into(),
        venue:       None,
      };
      self.store.insert_class(&class).await.unwrap();
      class
    }

    fn token(&self, user: &UserRecord) -> String {
      self.issuer.issue(user.id, user.role.as_deref()).unwrap()
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> Response {
      self.send(uri, token, vec![], Body::empty()).await
    }

    async fn send(
      &self,
      uri: &str,
      token: Option<&str>,
      headers: Vec<(header::HeaderName, &str)>,
      body: Body,
    ) -> Response {
      let mut builder = Request::builder().method("GET").uri(uri);
      if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
      }
      for (k, v) in headers {
        builder = builder.header(k, v);
      }
      router(self.state.clone()).oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    /// Stop accepting activity and wait for the queue to drain.
    async fn drain(self) -> SqliteStore {
      let Fixture { store, state, worker, .. } = self;
      drop(state);
      worker.await.unwrap();
      store
    }
  }

  async fn json(res: Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  async fn error_of(res: Response) -> String {
    json(res).await["error"].as_str().unwrap_or_default().to_owned()
  }

  // ── Public and authentication ───────────────────────────────────────────────

  #[tokio::test]
  async fn health_needs_no_credential() {
    let f = fixture().await;
    let res = f.get("/health", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json(res).await["status"], "ok");
  }

  #[tokio::test]
  async fn missing_token_is_401() {
    let f = fixture().await;
    let res = f.get("/api/me", None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_of(res).await, "Access token required");
  }

  #[tokio::test]
  async fn forged_and_expired_tokens_are_403() {
    let f = fixture().await;
    let u = f.user("ayanda", Some("student"), Some("ICT")).await;

    let forged = TokenIssuer::new("not the secret", TimeDelta::hours(1))
      .issue(u.id, None)
      .unwrap();
    let res = f.get("/api/me", Some(&forged)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_of(res).await, "Invalid token");

    let expired = f
      .issuer
      .issue_at(u.id, None, Utc::now() - TimeDelta::hours(2))
      .unwrap();
    let res = f.get("/api/me", Some(&expired)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_of(res).await, "Token expired");
  }

  #[tokio::test]
  async fn token_for_deleted_user_is_rejected() {
    let f = fixture().await;
    let token = f.issuer.issue(Uuid::new_v4(), Some("student")).unwrap();
    let res = f.get("/api/me", Some(&token)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_of(res).await, "User not found");
  }

  #[tokio::test]
  async fn disabled_account_is_rejected_despite_valid_token() {
    let f = fixture().await;
    let u = f.user("bongani", Some("lecturer"), Some("ICT")).await;
    let token = f.token(&u);
    assert_eq!(f.get("/api/me", Some(&token)).await.status(), StatusCode::OK);

    f.store.set_user_status(u.id, &AccountStatus::Disabled).await.unwrap();
    let res = f.get("/api/me", Some(&token)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_of(res).await, "Account is disabled");
  }

  #[tokio::test]
  async fn live_row_role_overrides_token_claim() {
    let f = fixture().await;
    let u = f.user("khanyi", Some("Teacher"), Some("ICT")).await;
    let token = f.issuer.issue(u.id, Some("program leader")).unwrap();

    let body = json(f.get("/api/me", Some(&token)).await).await;
    assert_eq!(body["role"], "lecturer");
    assert_eq!(body["username"], "khanyi");
    assert_eq!(body["status"], "active");
  }

  #[tokio::test]
  async fn authentication_stamps_last_activity() {
    let f = fixture().await;
    let u = f.user("dineo", Some("student"), None).await;
    f.get("/api/me", Some(&f.token(&u))).await;

    let mut stamped = None;
    for _ in 0..50 {
      stamped = f.store.last_activity(u.id).await.unwrap();
      if stamped.is_some() {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(stamped.is_some());
  }

  // ── Role and scope ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn students_cannot_list_courses() {
    let f = fixture().await;
    let u = f.user("tumi", Some("Learner"), Some("ICT")).await;
    let res = f.get("/api/courses", Some(&f.token(&u))).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(
      error_of(res).await,
      "Access denied. Required roles: lecturer, prl, program_leader. Your role: student"
    );
  }

  #[tokio::test]
  async fn lecturer_is_confined_to_own_faculty() {
    let f = fixture().await;
    let u = f.user("lebo", Some("lecturer"), Some("ICT")).await;
    f.course("DIT101", "ICT", None).await;
    f.course("DES101", "Design", None).await;
    let token = f.token(&u);

    let res = f.get("/api/courses", Some(&token)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json(res).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["code"], "DIT101");

    let res = f.get("/api/courses?faculty_name=Design", Some(&token)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(
      error_of(res).await,
      "Access denied: cannot access data from another faculty"
    );

    let res = f
      .send(
        "/api/courses",
        Some(&token),
        vec![(header::CONTENT_TYPE, "application/json")],
        Body::from(r#"{"faculty":"Design"}"#),
      )
      .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn elevated_roles_cross_faculties() {
    let f = fixture().await;
    let u = f.user("refilwe", Some("Principal Lecturer"), Some("ICT")).await;
    f.course("DES101", "Design", None).await;

    let res = f.get("/api/courses?faculty=Design", Some(&f.token(&u))).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json(res).await[0]["code"], "DES101");
  }

  #[tokio::test]
  async fn malformed_json_body_is_bad_request() {
    let f = fixture().await;
    let u = f.user("vusi", Some("lecturer"), Some("ICT")).await;
    let res = f
      .send(
        "/api/courses",
        Some(&f.token(&u)),
        vec![(header::CONTENT_TYPE, "application/json")],
        Body::from("{not json"),
      )
      .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn unknown_role_fails_the_all_roles_gate() {
    let f = fixture().await;
    let u = f.user("guest", Some("visitor"), Some("ICT")).await;
    let res = f
      .get(&format!("/api/submissions/{}", Uuid::new_v4()), Some(&f.token(&u)))
      .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(
      error_of(res).await,
      "Access denied. Required roles: student, lecturer, prl, program_leader. Your role: visitor"
    );
  }

  #[tokio::test]
  async fn json_bodies_are_scope_checked_in_any_media_type_spelling() {
    let f = fixture().await;
    let u = f.user("sipho", Some("lecturer"), Some("ICT")).await;
    let token = f.token(&u);

    for ct in ["Application/JSON", "application/vnd.api+json", "application/json; charset=utf-8"] {
      let res = f
        .send(
          "/api/courses",
          Some(&token),
          vec![(header::CONTENT_TYPE, ct)],
          Body::from(r#"{"faculty_name":"Design"}"#),
        )
        .await;
      assert_eq!(res.status(), StatusCode::FORBIDDEN, "{ct}");
    }

    let res = f
      .send(
        "/api/courses",
        Some(&token),
        vec![(header::CONTENT_TYPE, "application/ld+json")],
        Body::from(r#"{"department":"Multimedia"}"#),
      )
      .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
  }

  // ── Ownership ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn enrollment_scenario() {
    let f = fixture().await;
    let lecturer = f.user("sizwe", Some("lecturer"), Some("ICT")).await;
    let student = f.user("ntombi", Some("student"), Some("ICT")).await;
    let stranger = f.user("jabu", Some("student"), Some("ICT")).await;
    let other_prl = f.user("karabo", Some("PRL"), Some("Design")).await;

    let course = f.course("DIT301", "ICT", Some(lecturer.id)).await;
    let class = f.class(&course, Some(lecturer.id)).await;
    f.store.enroll(student.id, course.id, EnrollmentStatus::Enrolled).await.unwrap();

    let res = f.get(&format!("/api/classes/{}", class.id), Some(&f.token(&student))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json(res).await;
    assert_eq!(body["type"], "class");
    assert_eq!(body["id"], class.id.to_string());

    let res = f.get(&format!("/api/classes/{}", class.id), Some(&f.token(&stranger))).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_of(res).await, "Access denied: you do not have access to this class");

    let res = f.get(&format!("/api/courses/{}", course.id), Some(&f.token(&other_prl))).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = f.get(&format!("/api/users/{}", student.id), Some(&f.token(&student))).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json(res).await["username"], "ntombi");

    let res = f.get(&format!("/api/courses/{}", course.id), Some(&f.token(&lecturer))).await;
    assert_eq!(res.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn unknown_or_malformed_ids_are_not_found() {
    let f = fixture().await;
    let u = f.user("thandi", Some("program_leader"), Some("ICT")).await;
    let token = f.token(&u);

    let res = f.get(&format!("/api/assignments/{}", Uuid::new_v4()), Some(&token)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_of(res).await, "Assignment not found");

    let res = f.get("/api/assignments/not-a-uuid", Some(&token)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn masked_denial_looks_like_not_found() {
    let mut config = ServerConfig::new(SECRET);
    config.mask_denials = true;
    let f = fixture_with(config).await;
    let owner = f.user("owner", Some("lecturer"), Some("ICT")).await;
    let other = f.user("other", Some("lecturer"), Some("ICT")).await;
    let course = f.course("DIT401", "ICT", Some(owner.id)).await;

    let res = f.get(&format!("/api/courses/{}", course.id), Some(&f.token(&other))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_of(res).await, "Course not found");
  }

  #[tokio::test]
  async fn course_lecturer_reads_submissions() {
    let f = fixture().await;
    let lecturer = f.user("musa", Some("Lect"), Some("ICT")).await;
    let student = f.user("lwazi", Some("st"), Some("ICT")).await;
    let course = f.course("DIT501", "ICT", Some(lecturer.id)).await;
    let assignment = Assignment {
      id:         Uuid::new_v4(),
      course_id:  course.id,
      created_by: None,
      title:      "Project".into(),
      due_at:     None,
    };
    f.store.insert_assignment(&assignment).await.unwrap();
    let submission = Submission {
      id:            Uuid::new_v4(),
      assignment_id: assignment.id,
      student_id:    student.id,
      submitted_at:  Utc::now(),
      grade:         None,
    };
    f.store.insert_submission(&submission).await.unwrap();

    let uri = format!("/api/submissions/{}", submission.id);
    assert_eq!(f.get(&uri, Some(&f.token(&lecturer))).await.status(), StatusCode::OK);
    assert_eq!(f.get(&uri, Some(&f.token(&student))).await.status(), StatusCode::OK);
  }

  // ── Rate limiting ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn requests_over_the_tier_cap_are_throttled() {
    let mut config = ServerConfig::new(SECRET);
    config.rate_limit.student = 2;
    let f = fixture_with(config).await;
    let u = f.user("palesa", Some("student"), None).await;
    let token = f.token(&u);

    let res = f.get("/api/me", Some(&token)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-ratelimit-limit"], "2");
    assert_eq!(res.headers()["x-ratelimit-remaining"], "1");
    assert_eq!(f.get("/api/me", Some(&token)).await.status(), StatusCode::OK);

    let res = f.get("/api/me", Some(&token)).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(error_of(res).await, "Too many requests, please try again later");

    let other = f.user("naledi", Some("student"), None).await;
    assert_eq!(f.get("/api/me", Some(&f.token(&other))).await.status(), StatusCode::OK);
  }

  #[test]
  fn oversized_window_setting_saturates() {
    let settings = RateLimitSettings { window_secs: u64::MAX, ..RateLimitSettings::default() };
    assert_eq!(settings.limits().window, TimeDelta::MAX);
    let settings = RateLimitSettings { window_secs: 90, ..RateLimitSettings::default() };
    assert_eq!(settings.limits().window, TimeDelta::seconds(90));
  }

  // ── Activity ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn only_successful_views_are_logged() {
    let f = fixture().await;
    let lecturer = f.user("andile", Some("lecturer"), Some("ICT")).await;
    let student = f.user("puleng", Some("student"), Some("ICT")).await;
    let stranger = f.user("olwethu", Some("student"), Some("ICT")).await;
    let course = f.course("DIT601", "ICT", Some(lecturer.id)).await;
    let class = f.class(&course, Some(lecturer.id)).await;
    f.store.enroll(student.id, course.id, EnrollmentStatus::Enrolled).await.unwrap();

    let uri = format!("/api/classes/{}", class.id);
    let res = f
      .send(
        &uri,
        Some(&f.token(&student)),
        vec![
          (header::USER_AGENT, "warden-test"),
          (header::HeaderName::from_static("x-forwarded-for"), "198.51.100.4"),
        ],
        Body::empty(),
      )
      .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(f.get(&uri, Some(&f.token(&stranger))).await.status(), StatusCode::FORBIDDEN);
    let missing = format!("/api/classes/{}", Uuid::new_v4());
    assert_eq!(f.get(&missing, Some(&f.token(&student))).await.status(), StatusCode::NOT_FOUND);

    let store = f.drain().await;
    let trail = store.activity_for(student.id).await.unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action_type, "view_class");
    assert!(trail[0].description.contains("Tuesday lab"));
    assert_eq!(trail[0].origin.as_deref(), Some("198.51.100.4"));
    assert_eq!(trail[0].client.as_deref(), Some("warden-test"));
    assert!(store.activity_for(stranger.id).await.unwrap().is_empty());
  }

  // ── Swallowed side-effect failures ──────────────────────────────────────────

  #[derive(Debug, thiserror::Error)]
  enum FlakyError {
    #[error(transparent)]
    Sqlite(#[from] warden_store_sqlite::Error),
    #[error("store offline")]
    Offline,
  }

  /// Reads go to SQLite; the two best-effort writes always fail.
  #[derive(Clone)]
  struct WriteFailingStore {
    inner: SqliteStore,
  }

  impl UserStore for WriteFailingStore {
    type Error = FlakyError;

    async fn get_user(&self, id: Uuid) -> Result<Option<UserRecord>, FlakyError> {
      Ok(self.inner.get_user(id).await?)
    }

    async fn touch_last_activity(&self, _id: Uuid) -> Result<(), FlakyError> {
      Err(FlakyError::Offline)
    }
  }

  impl ResourceStore for WriteFailingStore {
    type Error = FlakyError;

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, FlakyError> {
      Ok(self.inner.get_course(id).await?)
    }

    async fn get_class(&self, id: Uuid) -> Result<Option<Class>, FlakyError> {
      Ok(self.inner.get_class(id).await?)
    }

    async fn get_assignment(&self, id: Uuid) -> Result<Option<Assignment>, FlakyError> {
      Ok(self.inner.get_assignment(id).await?)
    }

    async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>, FlakyError> {
      Ok(self.inner.get_submission(id).await?)
    }

    async fn get_user_profile(&self, id: Uuid) -> Result<Option<UserProfile>, FlakyError> {
      Ok(self.inner.get_user_profile(id).await?)
    }

    async fn resolve_course_faculty(&self, course_id: Uuid) -> Result<Option<String>, FlakyError> {
      Ok(self.inner.resolve_course_faculty(course_id).await?)
    }

    async fn is_enrolled(&self, student_id: Uuid, course_id: Uuid) -> Result<bool, FlakyError> {
      Ok(self.inner.is_enrolled(student_id, course_id).await?)
    }

    async fn list_courses<'a>(&'a self, faculty: &'a str) -> Result<Vec<Course>, FlakyError> {
      Ok(self.inner.list_courses(faculty).await?)
    }
  }

  impl ActivityStore for WriteFailingStore {
    type Error = FlakyError;

    async fn record_activity(&self, _entry: NewActivity) -> Result<ActivityRecord, FlakyError> {
      Err(FlakyError::Offline)
    }
  }

  #[tokio::test]
  async fn failed_touch_and_activity_writes_leave_responses_untouched() {
    let f = fixture().await;
    let lecturer = f.user("mpho", Some("lecturer"), Some("ICT")).await;
    let student = f.user("kamo", Some("student"), Some("ICT")).await;
    let course = f.course("DIT701", "ICT", Some(lecturer.id)).await;
    let class = f.class(&course, Some(lecturer.id)).await;
    f.store.enroll(student.id, course.id, EnrollmentStatus::Enrolled).await.unwrap();

    let (state, worker) =
      AppState::new(WriteFailingStore { inner: f.store.clone() }, ServerConfig::new(SECRET));
    let token = f.token(&student);
    let get = |uri: String| {
      let app = router(state.clone());
      let req = Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
      async move { app.oneshot(req).await.unwrap() }
    };

    let res = get("/api/me".into()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json(res).await["username"], "kamo");

    let res = get(format!("/api/classes/{}", class.id)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json(res).await;
    assert_eq!(body["type"], "class");
    assert_eq!(body["name"], "Tuesday lab");

    drop(get);
    drop(state);
    worker.await.unwrap();
    assert!(f.store.activity_for(student.id).await.unwrap().is_empty());
    assert_eq!(f.store.last_activity(student.id).await.unwrap(), None);
  }
}
