//! Ownership resolution for the five resource kinds.
//!
//! Every access rule lives here, in two tables keyed by resource kind:
//!
//! - [`plan`] decides which auxiliary fact, if any, a predicate needs. It
//!   answers [`AuxQuery::None`] whenever the subject's role settles the
//!   question without I/O, so no lookup is issued for a role that cannot
//!   pass.
//! - [`allows`] is a pure function of the resource, the subject and the
//!   fetched facts.
//!
//! | Kind       | Lecturer                                | PRL / Program Leader   | Student                    |
//! |------------|-----------------------------------------|------------------------|----------------------------|
//! | Course     | `lecturer_id` is self                   | course faculty matches | never                      |
//! | Class      | `lecturer_id` is self                   | parent faculty matches | enrolled in parent course  |
//! | Assignment | `created_by` is self                    | parent faculty matches | enrolled in parent course  |
//! | Submission | assignment creator or course lecturer   | chain faculty matches  | `student_id` is self       |
//! | User       | self                                    | self or faculty matches| self                       |
//!
//! A scope is never more than two foreign-key hops away, so at most two
//! auxiliary lookups are made per decision.

use uuid::Uuid;

use crate::{
  AuthError, Result,
  resource::{Assignment, Class, Course, Resource, ResourceKind, Submission, UserProfile},
  role::Role,
  store::ResourceStore,
  subject::Subject,
};

// ─── Auxiliary facts ──────────────────────────────────────────────────────────

/// The single auxiliary lookup a decision needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxQuery {
  None,
  /// Faculty of the given course.
  CourseFaculty(Uuid),
  /// Whether the subject is enrolled in the given course.
  Enrollment(Uuid),
  /// Assignment → course chain for a submission.
  SubmissionChain(Uuid),
}

/// Facts gathered for the parent of a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionChain {
  pub assignment_created_by: Option<Uuid>,
  pub course_lecturer_id:    Option<Uuid>,
  pub faculty_name:          Option<String>,
}

/// Result of running an [`AuxQuery`]. Unfetched facts stay at their default,
/// which never grants access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aux {
  pub course_faculty: Option<String>,
  pub enrolled:       bool,
  pub chain:          Option<SubmissionChain>,
}

// ─── Dispatch tables ──────────────────────────────────────────────────────────

/// Decide which auxiliary fact `resource`'s predicate needs for `subject`.
pub fn plan(resource: &Resource, subject: &Subject) -> AuxQuery {
  let role = subject.known_role();
  match resource {
    Resource::Course(_) | Resource::User(_) => AuxQuery::None,
    Resource::Class(class) => parent_course_query(role, class.course_id),
    Resource::Assignment(assignment) => parent_course_query(role, assignment.course_id),
    Resource::Submission(submission) => match role {
      Some(Role::Lecturer | Role::Prl | Role::ProgramLeader) => {
        AuxQuery::SubmissionChain(submission.assignment_id)
      }
      _ => AuxQuery::None,
    },
  }
}

fn parent_course_query(role: Option<Role>, course_id: Uuid) -> AuxQuery {
  match role {
    Some(Role::Prl | Role::ProgramLeader) => AuxQuery::CourseFaculty(course_id),
    Some(Role::Student) => AuxQuery::Enrollment(course_id),
    _ => AuxQuery::None,
  }
}

/// Apply the access predicate for `resource`.
pub fn allows(resource: &Resource, subject: &Subject, aux: &Aux) -> bool {
  match resource {
    Resource::Course(course) => course_access(course, subject),
    Resource::Class(class) => class_access(class, subject, aux),
    Resource::Assignment(assignment) => assignment_access(assignment, subject, aux),
    Resource::Submission(submission) => submission_access(submission, subject, aux),
    Resource::User(profile) => user_access(profile, subject),
  }
}

// ─── Predicates ───────────────────────────────────────────────────────────────

pub fn course_access(course: &Course, subject: &Subject) -> bool {
  match subject.known_role() {
    Some(Role::Lecturer) => course.lecturer_id == Some(subject.id),
    Some(Role::Prl | Role::ProgramLeader) => {
      subject.shares_faculty(course.faculty_name.as_deref())
    }
    _ => false,
  }
}

pub fn class_access(class: &Class, subject: &Subject, aux: &Aux) -> bool {
  parent_course_access(class.lecturer_id, subject, aux)
}

pub fn assignment_access(assignment: &Assignment, subject: &Subject, aux: &Aux) -> bool {
  parent_course_access(assignment.created_by, subject, aux)
}

fn parent_course_access(owner: Option<Uuid>, subject: &Subject, aux: &Aux) -> bool {
  match subject.known_role() {
    Some(Role::Lecturer) => owner == Some(subject.id),
    Some(Role::Prl | Role::ProgramLeader) => {
      subject.shares_faculty(aux.course_faculty.as_deref())
    }
    Some(Role::Student) => aux.enrolled,
    None => false,
  }
}

/// A lecturer passes as either the assignment's creator or the course's
/// lecturer; the creator clause also admits a co-teacher who does not own
/// the course.
pub fn submission_access(submission: &Submission, subject: &Subject, aux: &Aux) -> bool {
  match subject.known_role() {
    Some(Role::Student) => submission.student_id == subject.id,
    Some(Role::Lecturer) => aux.chain.as_ref().is_some_and(|chain| {
      chain.assignment_created_by == Some(subject.id)
        || chain.course_lecturer_id == Some(subject.id)
    }),
    Some(Role::Prl | Role::ProgramLeader) => aux
      .chain
      .as_ref()
      .is_some_and(|chain| subject.shares_faculty(chain.faculty_name.as_deref())),
    None => false,
  }
}

pub fn user_access(profile: &UserProfile, subject: &Subject) -> bool {
  profile.id == subject.id
    || (subject.is_elevated() && subject.shares_faculty(profile.faculty_name.as_deref()))
}

// ─── Resolver ─────────────────────────────────────────────────────────────────

/// A fetched resource together with the access decision for one subject.
#[derive(Debug, Clone)]
pub struct Resolved {
  pub resource:   Resource,
  pub has_access: bool,
}

impl Resolved {
  /// Turn a negative decision into [`AuthError::OwnershipDenied`].
  pub fn into_granted(self) -> Result<Resource> {
    if self.has_access {
      Ok(self.resource)
    } else {
      Err(AuthError::OwnershipDenied(self.resource.kind()))
    }
  }
}

/// Fetch the resource `kind`/`id` and decide whether `subject` may act on it.
///
/// Returns [`AuthError::ResourceNotFound`] when the resource does not exist.
/// Storage faults surface as [`AuthError::Store`]; nothing is mutated.
pub async fn resolve<S>(
  store: &S,
  kind: ResourceKind,
  id: Uuid,
  subject: &Subject,
) -> Result<Resolved>
where
  S: ResourceStore,
{
  let resource = fetch(store, kind, id)
    .await?
    .ok_or(AuthError::ResourceNotFound(kind))?;

  let aux = gather(store, plan(&resource, subject), subject).await?;
  let has_access = allows(&resource, subject, &aux);

  tracing::debug!(
    subject = %subject.id,
    kind = %kind,
    resource_id = %id,
    has_access,
    "ownership resolved"
  );

  Ok(Resolved { resource, has_access })
}

async fn fetch<S>(store: &S, kind: ResourceKind, id: Uuid) -> Result<Option<Resource>>
where
  S: ResourceStore,
{
  let resource = match kind {
    ResourceKind::Course => store.get_course(id).await.map_err(AuthError::store)?.map(Resource::Course),
    ResourceKind::Class => store.get_class(id).await.map_err(AuthError::store)?.map(Resource::Class),
    ResourceKind::Assignment => store
      .get_assignment(id)
      .await
      .map_err(AuthError::store)?
      .map(Resource::Assignment),
    ResourceKind::Submission => store
      .get_submission(id)
      .await
      .map_err(AuthError::store)?
      .map(Resource::Submission),
    ResourceKind::User => store
      .get_user_profile(id)
      .await
      .map_err(AuthError::store)?
      .map(Resource::User),
  };
  Ok(resource)
}

async fn gather<S>(store: &S, query: AuxQuery, subject: &Subject) -> Result<Aux>
where
  S: ResourceStore,
{
  let mut aux = Aux::default();
  match query {
    AuxQuery::None => {}
    AuxQuery::CourseFaculty(course_id) => {
      aux.course_faculty = store
        .resolve_course_faculty(course_id)
        .await
        .map_err(AuthError::store)?;
    }
    AuxQuery::Enrollment(course_id) => {
      aux.enrolled = store
        .is_enrolled(subject.id, course_id)
        .await
        .map_err(AuthError::store)?;
    }
    AuxQuery::SubmissionChain(assignment_id) => {
      let Some(assignment) = store
        .get_assignment(assignment_id)
        .await
        .map_err(AuthError::store)?
      else {
        return Ok(aux);
      };
      let course = store
        .get_course(assignment.course_id)
        .await
        .map_err(AuthError::store)?;
      aux.chain = Some(SubmissionChain {
        assignment_created_by: assignment.created_by,
        course_lecturer_id:    course.as_ref().and_then(|c| c.lecturer_id),
        faculty_name:          course.and_then(|c| c.faculty_name),
      });
    }
  }
  Ok(aux)
}
