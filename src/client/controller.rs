use std::sync::Arc;

use thiserror::Error;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::client::gateway::{GatewayError, RecordGateway, Session, SessionGateway};
use crate::pace::{calculate_pace, PaceError};
use crate::records::dto::CreateRecordRequest;
use crate::records::repo::TrainingRecord;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<PaceError> for ClientError {
    fn from(e: PaceError) -> Self {
        ClientError::InvalidInput(e.to_string())
    }
}

const DATE_FORMAT: &[time::format_description::FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Form state: all fields as text, exactly as a form widget holds them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordDraft {
    pub date: String,
    pub distance: String,
    pub duration: String,
    pub location: String,
    pub notes: String,
}

impl RecordDraft {
    /// Defaults: date is today, everything else empty.
    pub fn empty_for_today() -> Self {
        let date = OffsetDateTime::now_utc()
            .date()
            .format(&DATE_FORMAT)
            .unwrap_or_default();
        Self {
            date,
            ..Self::default()
        }
    }

    /// Validates the draft into a create request. Pace is computed here as
    /// well, so malformed distance or duration fails before any remote call.
    pub fn to_request(&self) -> Result<CreateRecordRequest, ClientError> {
        let date = Date::parse(self.date.trim(), &DATE_FORMAT)
            .map_err(|_| ClientError::InvalidInput(format!("invalid date {:?}", self.date)))?;
        let distance_km: f64 = self
            .distance
            .trim()
            .parse()
            .map_err(|_| ClientError::InvalidInput(format!("invalid distance {:?}", self.distance)))?;
        let duration = self.duration.trim().to_string();

        calculate_pace(distance_km, &duration)?;

        Ok(CreateRecordRequest {
            date,
            distance_km,
            duration,
            location: non_empty(&self.location),
            notes: non_empty(&self.notes),
        })
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Application state: session, record list and form draft, advanced by one
/// event at a time. Each mutation runs to completion before the next; after
/// every create or delete the list is re-fetched in full rather than patched.
pub struct AppController<S: SessionGateway, R: RecordGateway> {
    sessions: Arc<S>,
    store: Arc<R>,
    session_changes: watch::Receiver<Option<Session>>,
    pub session: Option<Session>,
    pub records: Vec<TrainingRecord>,
    pub draft: RecordDraft,
}

impl<S: SessionGateway, R: RecordGateway> AppController<S, R> {
    pub fn new(sessions: Arc<S>, store: Arc<R>) -> Self {
        let session_changes = sessions.subscribe();
        Self {
            sessions,
            store,
            session_changes,
            session: None,
            records: Vec::new(),
            draft: RecordDraft::empty_for_today(),
        }
    }

    /// On load: restore a persisted session, if any, and fetch its records.
    pub async fn bootstrap(&mut self) -> Result<(), ClientError> {
        let session = self.sessions.current_session().await;
        self.apply_session(session).await
    }

    /// Session transition: any change of identity (absent -> present, or a
    /// different user while one is already signed in) re-fetches the record
    /// list; present -> absent clears it.
    pub async fn apply_session(&mut self, next: Option<Session>) -> Result<(), ClientError> {
        let previous_user = self.session.as_ref().map(|s| s.user_id);
        let next_user = next.as_ref().map(|s| s.user_id);
        self.session = next;

        match next_user {
            Some(user) if next_user != previous_user => {
                debug!(user_id = %user, "session holder changed, re-fetching records");
                self.refresh_records().await?;
            }
            None if previous_user.is_some() => {
                debug!("session ended, clearing record list");
                self.records.clear();
            }
            _ => {}
        }
        Ok(())
    }

    /// Waits for the next session change published by the gateway and folds
    /// it into the controller state. A front-end loops on this so that a
    /// sign-in or sign-out performed by another holder of the same gateway
    /// is reflected here too.
    pub async fn next_session_change(&mut self) -> Result<(), ClientError> {
        if self.session_changes.changed().await.is_ok() {
            let next = self.session_changes.borrow_and_update().clone();
            self.apply_session(next).await?;
        }
        Ok(())
    }

    pub async fn refresh_records(&mut self) -> Result<(), ClientError> {
        self.records = self.store.list().await?;
        Ok(())
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<(), ClientError> {
        let session = self.sessions.sign_in(email, password).await?;
        self.apply_session(Some(session)).await
    }

    /// Sign-up only registers; a confirmation step precedes the first login.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<(), ClientError> {
        self.sessions.sign_up(email, password).await?;
        Ok(())
    }

    pub async fn sign_out(&mut self) -> Result<(), ClientError> {
        self.sessions.sign_out().await?;
        self.apply_session(None).await
    }

    /// Submit the form draft. On success the list is re-fetched and the
    /// draft reset; on any failure the draft is left untouched so the user
    /// may correct and resubmit.
    pub async fn submit_draft(&mut self) -> Result<(), ClientError> {
        if self.session.is_none() {
            return Err(ClientError::Gateway(GatewayError::NoSession));
        }
        let request = self.draft.to_request()?;
        self.store.create(&request).await?;
        self.refresh_records().await?;
        self.cancel_draft();
        Ok(())
    }

    pub fn cancel_draft(&mut self) {
        self.draft = RecordDraft::empty_for_today();
    }

    pub async fn delete_record(&mut self, id: Uuid) -> Result<(), ClientError> {
        self.store.delete(id).await?;
        self.refresh_records().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use time::macros::date;
    use tokio::sync::watch;

    struct FakeUser {
        id: Uuid,
        password: String,
        confirmed: bool,
    }

    /// Shared state standing in for the remote service. The record
    /// operations apply the same ownership filters as the SQL does.
    #[derive(Default)]
    struct Backend {
        users: Mutex<HashMap<String, FakeUser>>,
        records: Mutex<Vec<TrainingRecord>>,
    }

    impl Backend {
        fn add_user(&self, email: &str, password: &str, confirmed: bool) -> Uuid {
            let id = Uuid::new_v4();
            self.users.lock().unwrap().insert(
                email.to_string(),
                FakeUser {
                    id,
                    password: password.to_string(),
                    confirmed,
                },
            );
            id
        }

        fn confirm(&self, email: &str) {
            if let Some(user) = self.users.lock().unwrap().get_mut(email) {
                user.confirmed = true;
            }
        }

        fn seed_record(&self, user_id: Uuid, date: Date, distance_km: f64, duration: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.records.lock().unwrap().push(TrainingRecord {
                id,
                user_id,
                date,
                distance_km,
                duration: duration.to_string(),
                pace: calculate_pace(distance_km, duration).unwrap(),
                location: None,
                notes: None,
                created_at: OffsetDateTime::now_utc(),
            });
            id
        }
    }

    /// Plays the role of `HttpGateway`: both contracts behind one value,
    /// record operations acting as whoever currently holds the session.
    struct FakeGateway {
        backend: Arc<Backend>,
        session: Mutex<Option<Session>>,
        changes: watch::Sender<Option<Session>>,
    }

    impl FakeGateway {
        fn new(backend: Arc<Backend>) -> Arc<Self> {
            let (changes, _) = watch::channel(None);
            Arc::new(Self {
                backend,
                session: Mutex::new(None),
                changes,
            })
        }

        fn restore(&self, session: Session) {
            *self.session.lock().unwrap() = Some(session);
        }

        fn caller(&self) -> Result<Uuid, GatewayError> {
            self.session
                .lock()
                .unwrap()
                .as_ref()
                .map(|s| s.user_id)
                .ok_or(GatewayError::NoSession)
        }
    }

    #[async_trait]
    impl SessionGateway for FakeGateway {
        async fn current_session(&self) -> Option<Session> {
            self.session.lock().unwrap().clone()
        }

        async fn sign_in(&self, email: &str, password: &str) -> Result<Session, GatewayError> {
            let session = {
                let users = self.backend.users.lock().unwrap();
                let user = users
                    .get(email)
                    .filter(|u| u.password == password)
                    .ok_or_else(|| GatewayError::Auth("invalid credentials".into()))?;
                if !user.confirmed {
                    return Err(GatewayError::Auth("account not confirmed".into()));
                }
                Session {
                    user_id: user.id,
                    email: email.to_string(),
                    access_token: "fake-token".into(),
                }
            };
            *self.session.lock().unwrap() = Some(session.clone());
            self.changes.send_replace(Some(session.clone()));
            Ok(session)
        }

        async fn sign_up(&self, email: &str, password: &str) -> Result<(), GatewayError> {
            if self.backend.users.lock().unwrap().contains_key(email) {
                return Err(GatewayError::Store("email already registered".into()));
            }
            self.backend.add_user(email, password, false);
            Ok(())
        }

        async fn sign_out(&self) -> Result<(), GatewayError> {
            *self.session.lock().unwrap() = None;
            self.changes.send_replace(None);
            Ok(())
        }

        fn subscribe(&self) -> watch::Receiver<Option<Session>> {
            self.changes.subscribe()
        }
    }

    #[async_trait]
    impl RecordGateway for FakeGateway {
        async fn list(&self) -> Result<Vec<TrainingRecord>, GatewayError> {
            let caller = self.caller()?;
            let mut rows: Vec<_> = self
                .backend
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.user_id == caller)
                .cloned()
                .collect();
            rows.sort_by(|a, b| (b.date, b.created_at).cmp(&(a.date, a.created_at)));
            Ok(rows)
        }

        async fn create(&self, record: &CreateRecordRequest) -> Result<(), GatewayError> {
            let caller = self.caller()?;
            let pace = calculate_pace(record.distance_km, &record.duration)
                .map_err(|e| GatewayError::Store(e.to_string()))?;
            self.backend.records.lock().unwrap().push(TrainingRecord {
                id: Uuid::new_v4(),
                user_id: caller,
                date: record.date,
                distance_km: record.distance_km,
                duration: record.duration.clone(),
                pace,
                location: record.location.clone(),
                notes: record.notes.clone(),
                created_at: OffsetDateTime::now_utc(),
            });
            Ok(())
        }

        async fn delete(&self, id: Uuid) -> Result<(), GatewayError> {
            let caller = self.caller()?;
            self.backend
                .records
                .lock()
                .unwrap()
                .retain(|r| !(r.id == id && r.user_id == caller));
            Ok(())
        }
    }

    fn make_controller(
        backend: &Arc<Backend>,
    ) -> (AppController<FakeGateway, FakeGateway>, Arc<FakeGateway>) {
        let gateway = FakeGateway::new(backend.clone());
        let app = AppController::new(gateway.clone(), gateway.clone());
        (app, gateway)
    }

    #[tokio::test]
    async fn sign_in_populates_records_and_sign_out_clears_them() {
        let backend = Arc::new(Backend::default());
        let user = backend.add_user("runner@example.com", "pw-eight+", true);
        backend.seed_record(user, date!(2025 - 02 - 14), 12.0, "1:05");

        let (mut app, _gateway) = make_controller(&backend);
        assert!(app.records.is_empty());

        app.sign_in("runner@example.com", "pw-eight+").await.unwrap();
        assert_eq!(app.records.len(), 1);

        app.sign_out().await.unwrap();
        assert!(app.session.is_none());
        assert!(app.records.is_empty());
    }

    #[tokio::test]
    async fn bootstrap_restores_a_persisted_session() {
        let backend = Arc::new(Backend::default());
        let user = backend.add_user("runner@example.com", "pw-eight+", true);
        backend.seed_record(user, date!(2025 - 01 - 05), 8.0, "0:44");

        let (mut app, gateway) = make_controller(&backend);
        gateway.restore(Session {
            user_id: user,
            email: "runner@example.com".into(),
            access_token: "fake-token".into(),
        });

        app.bootstrap().await.unwrap();
        assert!(app.session.is_some());
        assert_eq!(app.records.len(), 1);
    }

    #[tokio::test]
    async fn records_list_in_descending_date_order() {
        let backend = Arc::new(Backend::default());
        let user = backend.add_user("runner@example.com", "pw-eight+", true);
        backend.seed_record(user, date!(2025 - 01 - 01), 5.0, "0:30");
        backend.seed_record(user, date!(2025 - 03 - 01), 5.0, "0:30");
        backend.seed_record(user, date!(2025 - 02 - 01), 5.0, "0:30");

        let (mut app, _gateway) = make_controller(&backend);
        app.sign_in("runner@example.com", "pw-eight+").await.unwrap();

        let dates: Vec<Date> = app.records.iter().map(|r| r.date).collect();
        assert_eq!(
            dates,
            vec![
                date!(2025 - 03 - 01),
                date!(2025 - 02 - 01),
                date!(2025 - 01 - 01)
            ]
        );
    }

    #[tokio::test]
    async fn submitted_draft_round_trips_with_computed_pace() {
        let backend = Arc::new(Backend::default());
        backend.add_user("runner@example.com", "pw-eight+", true);

        let (mut app, _gateway) = make_controller(&backend);
        app.sign_in("runner@example.com", "pw-eight+").await.unwrap();

        app.draft = RecordDraft {
            date: "2025-03-01".into(),
            distance: "10".into(),
            duration: "0:50".into(),
            location: "riverside loop".into(),
            notes: "  easy run ".into(),
        };
        app.submit_draft().await.unwrap();

        assert_eq!(app.records.len(), 1);
        let record = &app.records[0];
        assert_eq!(record.date, date!(2025 - 03 - 01));
        assert_eq!(record.distance_km, 10.0);
        assert_eq!(record.duration, "0:50");
        assert_eq!(record.location.as_deref(), Some("riverside loop"));
        assert_eq!(record.notes.as_deref(), Some("easy run"));
        assert_eq!(record.pace, calculate_pace(10.0, "0:50").unwrap());

        // Draft reset to defaults after a successful create.
        assert_eq!(app.draft, RecordDraft::empty_for_today());
        assert!(!app.draft.date.is_empty());
    }

    #[tokio::test]
    async fn failed_submit_leaves_the_draft_untouched() {
        let backend = Arc::new(Backend::default());
        backend.add_user("runner@example.com", "pw-eight+", true);

        let (mut app, _gateway) = make_controller(&backend);
        app.sign_in("runner@example.com", "pw-eight+").await.unwrap();

        let draft = RecordDraft {
            date: "2025-03-01".into(),
            distance: "0".into(),
            duration: "0:50".into(),
            location: String::new(),
            notes: String::new(),
        };
        app.draft = draft.clone();

        let err = app.submit_draft().await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
        assert_eq!(app.draft, draft);
        assert!(app.records.is_empty());
    }

    #[tokio::test]
    async fn submit_without_a_session_is_rejected() {
        let backend = Arc::new(Backend::default());
        let (mut app, _gateway) = make_controller(&backend);
        app.draft.distance = "10".into();
        app.draft.duration = "0:50".into();

        let err = app.submit_draft().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Gateway(GatewayError::NoSession)
        ));
    }

    #[tokio::test]
    async fn cancel_resets_the_draft_to_defaults() {
        let backend = Arc::new(Backend::default());
        let (mut app, _gateway) = make_controller(&backend);
        app.draft.distance = "21.1".into();
        app.draft.notes = "long run".into();

        app.cancel_draft();
        assert_eq!(app.draft, RecordDraft::empty_for_today());
    }

    #[tokio::test]
    async fn deleting_another_users_record_is_a_silent_noop() {
        let backend = Arc::new(Backend::default());
        backend.add_user("a@example.com", "pw-eight+", true);
        let user_b = backend.add_user("b@example.com", "pw-eight+", true);
        let foreign = backend.seed_record(user_b, date!(2025 - 04 - 10), 15.0, "1:20");

        let (mut app, _gateway) = make_controller(&backend);
        app.sign_in("a@example.com", "pw-eight+").await.unwrap();

        // Completes without error, deletes nothing, and the foreign record
        // never shows up in A's list.
        app.delete_record(foreign).await.unwrap();
        assert!(app.records.is_empty());
        assert!(backend
            .records
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.id == foreign));
    }

    #[tokio::test]
    async fn owner_delete_removes_the_record_and_refreshes_the_list() {
        let backend = Arc::new(Backend::default());
        let user = backend.add_user("runner@example.com", "pw-eight+", true);
        let keep = backend.seed_record(user, date!(2025 - 05 - 02), 5.0, "0:27");
        let gone = backend.seed_record(user, date!(2025 - 05 - 03), 7.0, "0:38");

        let (mut app, _gateway) = make_controller(&backend);
        app.sign_in("runner@example.com", "pw-eight+").await.unwrap();
        assert_eq!(app.records.len(), 2);

        app.delete_record(gone).await.unwrap();
        assert_eq!(app.records.len(), 1);
        assert_eq!(app.records[0].id, keep);
    }

    #[tokio::test]
    async fn switching_accounts_replaces_the_record_list() {
        let backend = Arc::new(Backend::default());
        let user_a = backend.add_user("a@example.com", "pw-eight+", true);
        let user_b = backend.add_user("b@example.com", "pw-eight+", true);
        backend.seed_record(user_a, date!(2025 - 06 - 01), 10.0, "0:55");
        backend.seed_record(user_a, date!(2025 - 06 - 08), 12.0, "1:06");
        let b_record = backend.seed_record(user_b, date!(2025 - 06 - 15), 5.0, "0:26");

        let (mut app, _gateway) = make_controller(&backend);
        app.sign_in("a@example.com", "pw-eight+").await.unwrap();
        assert_eq!(app.records.len(), 2);

        // Second login without an intervening sign-out: the list must be
        // B's records, not a leftover of A's.
        app.sign_in("b@example.com", "pw-eight+").await.unwrap();
        assert_eq!(app.records.len(), 1);
        assert_eq!(app.records[0].id, b_record);
        assert!(app.records.iter().all(|r| r.user_id == user_b));
    }

    #[tokio::test]
    async fn gateway_published_session_changes_are_folded_into_state() {
        let backend = Arc::new(Backend::default());
        let user = backend.add_user("runner@example.com", "pw-eight+", true);
        backend.seed_record(user, date!(2025 - 07 - 04), 16.0, "1:30");

        let (mut app, gateway) = make_controller(&backend);

        // Another holder of the gateway signs in; the controller picks the
        // change up from the subscription, not from its own call.
        gateway.sign_in("runner@example.com", "pw-eight+").await.unwrap();
        app.next_session_change().await.unwrap();
        assert!(app.session.is_some());
        assert_eq!(app.records.len(), 1);

        gateway.sign_out().await.unwrap();
        app.next_session_change().await.unwrap();
        assert!(app.session.is_none());
        assert!(app.records.is_empty());
    }

    #[tokio::test]
    async fn sign_up_does_not_establish_a_session_and_login_waits_for_confirmation() {
        let backend = Arc::new(Backend::default());
        let (mut app, _gateway) = make_controller(&backend);

        app.sign_up("new@example.com", "pw-eight+").await.unwrap();
        assert!(app.session.is_none());

        let err = app.sign_in("new@example.com", "pw-eight+").await.unwrap_err();
        assert!(matches!(err, ClientError::Gateway(GatewayError::Auth(_))));

        backend.confirm("new@example.com");
        app.sign_in("new@example.com", "pw-eight+").await.unwrap();
        assert!(app.session.is_some());
    }

    #[test]
    fn draft_validation_rejects_malformed_fields() {
        let valid = RecordDraft {
            date: "2025-03-01".into(),
            distance: "10".into(),
            duration: "0:50".into(),
            location: String::new(),
            notes: String::new(),
        };
        assert!(valid.to_request().is_ok());

        let mut bad_date = valid.clone();
        bad_date.date = "01/03/2025".into();
        assert!(matches!(
            bad_date.to_request(),
            Err(ClientError::InvalidInput(_))
        ));

        let mut bad_distance = valid.clone();
        bad_distance.distance = "ten".into();
        assert!(matches!(
            bad_distance.to_request(),
            Err(ClientError::InvalidInput(_))
        ));

        let mut bad_duration = valid;
        bad_duration.duration = "50 minutes".into();
        assert!(matches!(
            bad_duration.to_request(),
            Err(ClientError::InvalidInput(_))
        ));
    }
}
