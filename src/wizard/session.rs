//! A wizard run bound to the backend and the local session file.

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{CampaignApi, CampaignId};
use crate::connectivity::{ConnectivityProbe, ConnectivityStatus};
use crate::error::SessionError;
use crate::steps::StepPayload;

use super::gate::GateContext;
use super::persist::SessionFile;
use super::sequencer::WizardSequencer;
use super::step::StepKind;
use super::store::StepStore;

/// What a rehydration pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HydrationReport {
    /// Steps whose payload was replaced by the server's copy.
    pub restored: Vec<StepKind>,
    /// Steps whose fetch failed; their local payload is unchanged.
    pub failed: Vec<(StepKind, String)>,
    /// Nothing was fetched: no campaign yet, or the backend is unreachable.
    pub skipped: bool,
}

pub struct WizardSession {
    sequencer: WizardSequencer,
    store: StepStore,
    probe: ConnectivityProbe,
    file: SessionFile,
}

impl WizardSession {
    /// Start a fresh wizard.
    pub fn new(api: Arc<dyn CampaignApi>, probe: ConnectivityProbe, file: SessionFile) -> Self {
        Self {
            sequencer: WizardSequencer::start(),
            store: StepStore::new(api),
            probe,
            file,
        }
    }

    /// Pick up where the session file left off, or start fresh when there is
    /// no file.
    pub async fn resume(
        api: Arc<dyn CampaignApi>,
        probe: ConnectivityProbe,
        file: SessionFile,
    ) -> Result<Self, SessionError> {
        let sequencer = match file.load().await? {
            Some(sequencer) => {
                info!(
                    session_id = %sequencer.session_id(),
                    step = ?sequencer.current_step(),
                    "Resuming wizard session"
                );
                sequencer
            }
            None => WizardSequencer::start(),
        };
        Ok(Self {
            sequencer,
            store: StepStore::new(api),
            probe,
            file,
        })
    }

    pub fn sequencer(&self) -> &WizardSequencer {
        &self.sequencer
    }

    pub fn store(&self) -> &StepStore {
        &self.store
    }

    pub fn probe(&self) -> &ConnectivityProbe {
        &self.probe
    }

    pub fn current_step(&self) -> Option<StepKind> {
        self.sequencer.current_step()
    }

    pub fn campaign_id(&self) -> Option<&CampaignId> {
        self.sequencer.campaign_id()
    }

    pub fn is_finished(&self) -> bool {
        self.sequencer.is_finished()
    }

    /// Refresh every step from the backend. Runs only when a campaign exists
    /// and the probe reports the backend reachable.
    pub async fn hydrate(&mut self) -> Result<HydrationReport, SessionError> {
        let mut report = HydrationReport::default();
        let Some(campaign_id) = self.sequencer.campaign_id().cloned() else {
            report.skipped = true;
            return Ok(report);
        };
        if self.probe.check().await != ConnectivityStatus::Connected {
            warn!(%campaign_id, "Backend unreachable, keeping local step data");
            report.skipped = true;
            return Ok(report);
        }

        let ctx = GateContext::now();
        for (step, result) in self.store.load_all(&campaign_id, &StepKind::ALL).await {
            match result {
                Ok(Some(payload)) => {
                    self.sequencer.draft_mut().restore(payload, &ctx);
                    report.restored.push(step);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(%campaign_id, %step, error = %e, "Failed to hydrate step");
                    report.failed.push((step, e.to_string()));
                }
            }
        }
        self.sequencer.refresh(&ctx);
        self.file.save(&self.sequencer).await?;

        info!(
            %campaign_id,
            restored = report.restored.len(),
            failed = report.failed.len(),
            "Wizard hydrated"
        );
        Ok(report)
    }

    /// Keep an unsubmitted edit locally.
    pub async fn save_draft(&mut self, payload: StepPayload) -> Result<(), SessionError> {
        self.sequencer.update_draft(payload, &GateContext::now());
        self.file.save(&self.sequencer).await
    }

    pub async fn back(&mut self) -> Result<Option<StepKind>, SessionError> {
        let step = self.sequencer.retreat();
        self.file.save(&self.sequencer).await?;
        Ok(step)
    }

    /// Submit the current step: gate, persist to the backend, then advance.
    ///
    /// The first submission of the general settings creates the campaign.
    /// Nothing advances when the gate or the save fails.
    pub async fn submit(&mut self, payload: StepPayload) -> Result<Option<StepKind>, SessionError> {
        let ctx = GateContext::now();
        let step = self.sequencer.check_submission(&payload, &ctx)?;

        let mut created = None;
        match (&payload, self.sequencer.campaign_id().cloned()) {
            (StepPayload::General(settings), None) => {
                created = Some(self.store.create_campaign(settings).await?);
            }
            (_, Some(campaign_id)) => {
                self.store.save(&campaign_id, &payload).await?;
                if step == StepKind::LandingPage {
                    self.store.validate_landing(&campaign_id).await?;
                }
            }
            (_, None) => return Err(SessionError::NoCampaign { step }),
        }

        let next = self.sequencer.advance_at(payload, created, &ctx)?;
        self.file.save(&self.sequencer).await?;
        Ok(next)
    }

    /// Drop the local snapshot and start over.
    pub async fn abandon(&mut self) -> Result<(), SessionError> {
        self.file.clear().await?;
        self.sequencer = WizardSequencer::start();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::error::{AdvanceError, ApiError};
    use crate::steps::{GeneralSettings, Target, TargetList, TrainingSettings};
    use crate::testing::ScriptedApi;
    use crate::wizard::draft::StepStatus;

    fn general(name: &str) -> StepPayload {
        StepPayload::General(GeneralSettings {
            name: name.to_string(),
            description: "Quarterly awareness".into(),
            launch_at: Utc::now() + chrono::Duration::days(3),
            timezone: None,
        })
    }

    fn targets() -> StepPayload {
        let mut list = TargetList::new();
        list.add(Target::new("Ada", "Lovelace", "ada@example.com"))
            .unwrap();
        StepPayload::Targets(list)
    }

    fn session(api: &Arc<ScriptedApi>, dir: &tempfile::TempDir) -> WizardSession {
        let api = Arc::clone(api) as Arc<dyn CampaignApi>;
        let probe = ConnectivityProbe::from_api(
            Arc::clone(&api),
            Duration::from_secs(1),
            Duration::ZERO,
        );
        WizardSession::new(api, probe, SessionFile::new(dir.path().join("session.json")))
    }

    #[tokio::test]
    async fn first_submit_creates_campaign_once() {
        let dir = tempfile::tempdir().unwrap();
        let api = ScriptedApi::new();
        let mut session = session(&api, &dir);

        let next = session.submit(general("Q3 phishing")).await.unwrap();
        assert_eq!(next, Some(StepKind::Targets));
        assert_eq!(session.campaign_id().unwrap().as_str(), "cmp-1");

        session.back().await.unwrap();
        session.submit(general("Q3 phishing v2")).await.unwrap();
        assert_eq!(api.creates.load(Ordering::SeqCst), 1);
        assert_eq!(session.campaign_id().unwrap().as_str(), "cmp-1");
        let saves = api.saves.lock().await;
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].0, StepKind::General);
    }

    #[tokio::test]
    async fn gate_failure_never_reaches_backend() {
        let dir = tempfile::tempdir().unwrap();
        let api = ScriptedApi::new();
        let mut session = session(&api, &dir);

        let err = session.submit(general("ab")).await.unwrap_err();
        assert!(matches!(err, SessionError::Advance(AdvanceError::Gate { .. })));
        assert_eq!(api.creates.load(Ordering::SeqCst), 0);
        assert_eq!(session.current_step(), Some(StepKind::General));
    }

    #[tokio::test]
    async fn failed_save_does_not_advance() {
        let dir = tempfile::tempdir().unwrap();
        let api = ScriptedApi::new();
        let mut session = session(&api, &dir);
        session.submit(general("Q3 phishing")).await.unwrap();

        api.save_failures.lock().await.push_back(ApiError::Network {
            operation: "save_step".into(),
            reason: "connection reset".into(),
        });
        let err = session.submit(targets()).await.unwrap_err();
        assert!(matches!(err, SessionError::Api(ApiError::Network { .. })));
        assert_eq!(session.current_step(), Some(StepKind::Targets));
        assert_eq!(
            session.sequencer().draft().status(StepKind::Targets),
            StepStatus::NotStarted
        );

        assert_eq!(session.submit(targets()).await.unwrap(), Some(StepKind::Templates));
    }

    #[tokio::test]
    async fn reload_resumes_on_same_step() {
        let dir = tempfile::tempdir().unwrap();
        let api = ScriptedApi::new();
        let mut first = session(&api, &dir);
        first.submit(general("Q3 phishing")).await.unwrap();
        first.submit(targets()).await.unwrap();

        let dyn_api = Arc::clone(&api) as Arc<dyn CampaignApi>;
        let probe =
            ConnectivityProbe::from_api(Arc::clone(&dyn_api), Duration::from_secs(1), Duration::ZERO);
        let mut resumed = WizardSession::resume(
            dyn_api,
            probe,
            SessionFile::new(dir.path().join("session.json")),
        )
        .await
        .unwrap();
        assert_eq!(resumed.current_step(), Some(StepKind::Templates));
        assert_eq!(resumed.sequencer().session_id(), first.sequencer().session_id());

        let report = resumed.hydrate().await.unwrap();
        assert!(!report.skipped);
        assert_eq!(report.restored, vec![StepKind::Targets]);
        assert_eq!(
            resumed.sequencer().draft().status(StepKind::Targets),
            StepStatus::Complete
        );
    }

    #[tokio::test]
    async fn hydrate_is_skipped_while_disconnected() {
        let dir = tempfile::tempdir().unwrap();
        let api = ScriptedApi::new();
        let mut session = session(&api, &dir);
        session.submit(general("Q3 phishing")).await.unwrap();

        api.healthy.store(false, Ordering::SeqCst);
        let report = session.hydrate().await.unwrap();
        assert!(report.skipped);
        assert!(report.restored.is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_local_payload() {
        let dir = tempfile::tempdir().unwrap();
        let api = ScriptedApi::new();
        let mut session = session(&api, &dir);
        session.submit(general("Q3 phishing")).await.unwrap();
        session.submit(targets()).await.unwrap();

        api.stored
            .lock()
            .await
            .insert(StepKind::Targets, serde_json::json!({"targets": "oops"}));
        let report = session.hydrate().await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, StepKind::Targets);
        assert_eq!(
            session.sequencer().draft().payload(StepKind::Targets),
            Some(&targets())
        );
    }

    #[tokio::test]
    async fn landing_refusal_blocks_advance() {
        let dir = tempfile::tempdir().unwrap();
        let api = ScriptedApi::new();
        let mut session = session(&api, &dir);
        session.submit(general("Q3 phishing")).await.unwrap();
        session.submit(targets()).await.unwrap();
        let mut selection = crate::steps::TemplateSelection::default();
        selection.select("tpl-1");
        session
            .submit(StepPayload::Templates(selection))
            .await
            .unwrap();

        let page = crate::steps::LandingPage {
            active_tab: crate::steps::LandingTab::Template,
            clone_url: None,
            clone_status: crate::operation::OperationState::Idle,
            cloned_preview_url: None,
            template_id: Some("bank-login".into()),
            template_preview_url: Some("https://preview.local/t/bank-login".into()),
        };
        api.validate_landing
            .lock()
            .await
            .push_back(Err(ApiError::Rejected {
                operation: "validate_landing_step".into(),
                message: "template not found".into(),
            }));
        let err = session
            .submit(StepPayload::LandingPage(page.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::StepNotReady { .. }));
        assert_eq!(session.current_step(), Some(StepKind::LandingPage));

        let next = session
            .submit(StepPayload::LandingPage(page))
            .await
            .unwrap();
        assert_eq!(next, Some(StepKind::SmtpDns));
    }

    #[tokio::test]
    async fn abandon_clears_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let api = ScriptedApi::new();
        let mut session = session(&api, &dir);
        session.submit(general("Q3 phishing")).await.unwrap();
        session
            .save_draft(StepPayload::Training(TrainingSettings::disabled()))
            .await
            .unwrap();
        assert!(dir.path().join("session.json").exists());

        session.abandon().await.unwrap();
        assert!(!dir.path().join("session.json").exists());
        assert!(session.campaign_id().is_none());
        assert_eq!(session.current_step(), Some(StepKind::General));
    }
}
