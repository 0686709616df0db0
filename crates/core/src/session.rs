//! Authentication session state.
//!
//! A [`Session`] tracks who is signed in and their doctor profile as an immutable
//! [`AuthState`] snapshot. Each transition publishes a fresh snapshot on a `watch` channel;
//! subscribers always see a complete state, never a half-applied one. The single exception
//! is [`Session::update_profile`], which merges the changed profile fields into the current
//! snapshot in place.

use crate::auth::{AuthProvider, Identity};
use crate::doctor::{Doctor, DoctorChanges, NewDoctor};
use crate::repositories::doctors::DoctorDirectory;
use crate::{RecordError, RecordResult};
use medirx_types::EmailAddress;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthState {
    pub user: Option<Identity>,
    pub doctor: Option<Doctor>,
    pub loading: bool,
    pub error: Option<String>,
}

impl AuthState {
    /// State before the identity provider has reported anything.
    pub fn initial() -> Self {
        Self {
            user: None,
            doctor: None,
            loading: true,
            error: None,
        }
    }

    fn signed_out() -> Self {
        Self {
            loading: false,
            ..Self::initial()
        }
    }

    fn signed_in(user: Identity, doctor: Doctor) -> Self {
        Self {
            user: Some(user),
            doctor: Some(doctor),
            loading: false,
            error: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::initial()
    }
}

pub struct Session {
    auth: Arc<dyn AuthProvider>,
    doctors: DoctorDirectory,
    state: watch::Sender<AuthState>,
}

impl Session {
    pub fn new(auth: Arc<dyn AuthProvider>, doctors: DoctorDirectory) -> Self {
        let (state, _) = watch::channel(AuthState::initial());
        Self {
            auth,
            doctors,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    fn publish(&self, state: AuthState) -> AuthState {
        self.state.send_replace(state.clone());
        state
    }

    fn begin(&self) -> AuthState {
        let previous = self.snapshot();
        self.publish(AuthState {
            loading: true,
            error: None,
            ..previous.clone()
        });
        previous
    }

    /// Restores `previous` with the error attached and hands the error back.
    fn fail(&self, previous: AuthState, err: RecordError) -> RecordError {
        tracing::warn!(error = %err, "session transition failed");
        self.publish(AuthState {
            loading: false,
            error: Some(err.to_string()),
            ..previous
        });
        err
    }

    /// Reacts to the identity provider reporting a (possibly absent) signed-in user.
    pub async fn identity_changed(&self, identity: Option<Identity>) -> RecordResult<AuthState> {
        let Some(identity) = identity else {
            return Ok(self.publish(AuthState::signed_out()));
        };

        let previous = self.begin();
        match self.load_profile(&identity).await {
            Ok(doctor) => Ok(self.publish(AuthState::signed_in(identity, doctor))),
            Err(e) => Err(self.fail(previous, e)),
        }
    }

    /// Creates an account and its doctor profile, then signs in.
    pub async fn register(
        &self,
        email: &EmailAddress,
        password: &str,
        profile: NewDoctor,
    ) -> RecordResult<AuthState> {
        let previous = self.begin();

        let identity = match self.auth.create_user(email, password).await {
            Ok(identity) => identity,
            Err(e) => return Err(self.fail(previous, e.into())),
        };
        let doctor = match self.doctors.create(&identity.uid, email, profile).await {
            Ok(doctor) => doctor,
            Err(e) => return Err(self.fail(previous, e)),
        };

        tracing::info!(doctor_id = %identity.uid, "doctor registered");
        Ok(self.publish(AuthState::signed_in(identity, doctor)))
    }

    /// Signs in. A missing doctor profile is created with a placeholder name.
    pub async fn login(&self, email: &EmailAddress, password: &str) -> RecordResult<AuthState> {
        let previous = self.begin();

        let identity = match self.auth.sign_in(email, password).await {
            Ok(identity) => identity,
            Err(e) => return Err(self.fail(previous, e.into())),
        };
        let doctor = match self.load_profile(&identity).await {
            Ok(doctor) => doctor,
            Err(e) => return Err(self.fail(previous, e)),
        };

        tracing::info!(doctor_id = %identity.uid, "doctor signed in");
        Ok(self.publish(AuthState::signed_in(identity, doctor)))
    }

    pub async fn logout(&self) -> RecordResult<()> {
        let previous = self.snapshot();
        if let Some(identity) = previous.user.clone() {
            if let Err(e) = self.auth.sign_out(&identity).await {
                return Err(self.fail(previous, e.into()));
            }
            tracing::info!(doctor_id = %identity.uid, "doctor signed out");
        }
        self.publish(AuthState::signed_out());
        Ok(())
    }

    /// Persists profile changes and merges them into the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Unauthenticated` if nobody is signed in.
    pub async fn update_profile(&self, changes: DoctorChanges) -> RecordResult<Doctor> {
        let previous = self.snapshot();
        let Some(uid) = previous.user.as_ref().map(|u| u.uid.clone()) else {
            return Err(self.fail(previous, RecordError::Unauthenticated));
        };

        let stored = match self.doctors.update(&uid, changes.clone()).await {
            Ok(doctor) => doctor,
            Err(e) => return Err(self.fail(previous, e)),
        };

        self.state.send_modify(|state| {
            match state.doctor.as_mut() {
                Some(doctor) => {
                    changes.merge_into(doctor);
                    doctor.updated_at = stored.updated_at;
                }
                None => state.doctor = Some(stored.clone()),
            }
            state.error = None;
        });
        Ok(stored)
    }

    async fn load_profile(&self, identity: &Identity) -> RecordResult<Doctor> {
        match &identity.email {
            Some(email) => self.doctors.ensure_profile(&identity.uid, email).await,
            None => self
                .doctors
                .get(&identity.uid)
                .await?
                .ok_or(RecordError::DoctorNotFound),
        }
    }
}
