//! Session actor: the single task that owns `SessionState`.
//!
//! Commands from the API and completions from external calls arrive on one mpsc channel
//! and are applied strictly in order. Effects returned by a transition are executed here:
//! service calls run in spawned tasks under `tokio::time::timeout` and report back as
//! events. Stats writes, archive appends and review picks go to a storage task that runs
//! them one at a time on the blocking pool, in the order the actor issued them. After
//! every event the new snapshot is published on a watch channel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, instrument};

use crate::archive::{Archive, ProblemRecord, SubmissionRecord};
use crate::domain::ProblemSource;
use crate::error::{PracticeError, Result};
use crate::generator::{GeneratedProblem, ProblemGenerator};
use crate::grader::Grader;
use crate::protocol::SessionSnapshot;
use crate::selector::WeakTopic;
use crate::session::{Effect, Event, SessionState};
use crate::stats::StatsTracker;
use crate::store::StatsStore;

const COMMAND_BUFFER: usize = 64;

/// External collaborators of a session.
#[derive(Clone)]
pub struct Services {
  pub generator: Arc<dyn ProblemGenerator>,
  pub grader: Arc<dyn Grader>,
  pub store: Option<StatsStore>,
  pub archive: Option<Archive>,
  pub generation_timeout: Duration,
  pub grading_timeout: Duration,
}

/// Cheap, cloneable access to a running session.
#[derive(Clone)]
pub struct SessionHandle {
  tx: mpsc::Sender<Event>,
  snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
  pub async fn send(&self, event: Event) -> Result<()> {
    self.tx.send(event).await.map_err(|_| PracticeError::SessionClosed)
  }

  pub fn snapshot(&self) -> SessionSnapshot {
    self.snapshots.borrow().clone()
  }

  pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
    self.snapshots.clone()
  }
}

/// Start the actor on the current tokio runtime.
pub fn spawn_session(state: SessionState, services: Services) -> SessionHandle {
  let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
  let (snap_tx, snap_rx) = watch::channel(SessionSnapshot::from(&state));
  let storage = spawn_storage(services.store.clone(), services.archive.clone());
  let actor = SessionActor { state, services, storage, events: tx.downgrade(), snapshots: snap_tx };
  tokio::spawn(actor.run(rx));
  SessionHandle { tx, snapshots: snap_rx }
}

struct SessionActor {
  state: SessionState,
  services: Services,
  storage: mpsc::UnboundedSender<StorageJob>,
  // Weak so the actor stops once every handle and in-flight call is gone.
  events: mpsc::WeakSender<Event>,
  snapshots: watch::Sender<SessionSnapshot>,
}

impl SessionActor {
  async fn run(mut self, mut rx: mpsc::Receiver<Event>) {
    info!(target: "session", "Session actor started");
    while let Some(event) = rx.recv().await {
      debug!(target: "session", ?event, "Applying event");
      for effect in self.state.apply(event) {
        self.execute(effect);
      }
      self.snapshots.send_replace(SessionSnapshot::from(&self.state));
    }
    info!(target: "session", "Session actor stopped");
  }

  #[instrument(level = "debug", skip_all)]
  fn execute(&self, effect: Effect) {
    match effect {
      Effect::Generate { token, request } => {
        let generator = self.services.generator.clone();
        let after = self.services.generation_timeout;
        self.complete(async move {
          let result = with_timeout("Problem generation", after, generator.generate(&request)).await;
          Event::ProblemReady { token, result }
        });
      }

      Effect::LoadReview { token, ranking } => {
        let (reply, picked) = oneshot::channel();
        self.store(StorageJob::PickReview { ranking, reply });
        self.complete(async move {
          let result = picked
            .await
            .map_err(|_| PracticeError::Archive("storage task stopped".into()))
            .and_then(|r| r)
            .and_then(|found| found.ok_or_else(|| PracticeError::Archive("no archived problem to review yet".into())))
            .map(|rec| GeneratedProblem {
              topic: rec.topic,
              difficulty: rec.difficulty,
              problem_text: rec.problem_text,
              testcases: rec.testcases,
              source: ProblemSource::Review,
            });
          Event::ProblemReady { token, result }
        });
      }

      Effect::AlternateAnswer { token, problem_text, language } => {
        let generator = self.services.generator.clone();
        let after = self.services.generation_timeout;
        self.complete(async move {
          let result = with_timeout("Alternate answer", after, generator.alternate_answer(&problem_text, language)).await;
          Event::AnswerReady { token, result }
        });
      }

      Effect::Grade { token, code, language, testcases } => {
        let grader = self.services.grader.clone();
        let after = self.services.grading_timeout;
        self.complete(async move {
          let result = with_timeout("Grading", after, grader.grade(&code, language, &testcases)).await;
          Event::GradeReady { token, result }
        });
      }

      Effect::RunFreeInput { token, code, language, stdin } => {
        let grader = self.services.grader.clone();
        let after = self.services.grading_timeout;
        self.complete(async move {
          let result = with_timeout("Free run", after, grader.run_free_input(&code, language, &stdin)).await;
          Event::FreeRunFinished { token, result }
        });
      }

      Effect::PersistStats(stats) => self.store(StorageJob::SaveStats(stats)),
      Effect::ArchiveProblem(record) => self.store(StorageJob::AppendProblem(record)),
      Effect::ArchiveSubmission(record) => self.store(StorageJob::AppendSubmission(record)),
    }
  }

  fn store(&self, job: StorageJob) {
    if self.storage.send(job).is_err() {
      error!(target: "practice_backend", "Storage task stopped; dropping write");
    }
  }

  /// Run `fut` off the actor and feed its completion event back in.
  fn complete<F>(&self, fut: F)
  where
    F: Future<Output = Event> + Send + 'static,
  {
    let Some(tx) = self.events.upgrade() else {
      return;
    };
    tokio::spawn(async move {
      let event = fut.await;
      if tx.send(event).await.is_err() {
        debug!(target: "session", "Session closed before completion was delivered");
      }
    });
  }
}

/// File work requested by the actor. Jobs run in send order.
enum StorageJob {
  SaveStats(StatsTracker),
  AppendProblem(ProblemRecord),
  AppendSubmission(SubmissionRecord),
  PickReview { ranking: Vec<WeakTopic>, reply: oneshot::Sender<Result<Option<ProblemRecord>>> },
}

/// Spawn the storage task. It stops when the actor drops its sender.
fn spawn_storage(store: Option<StatsStore>, archive: Option<Archive>) -> mpsc::UnboundedSender<StorageJob> {
  let (tx, mut rx) = mpsc::unbounded_channel::<StorageJob>();
  tokio::spawn(async move {
    while let Some(job) = rx.recv().await {
      let store = store.clone();
      let archive = archive.clone();
      let done = tokio::task::spawn_blocking(move || run_storage_job(job, store.as_ref(), archive.as_ref())).await;
      if let Err(e) = done {
        error!(target: "practice_backend", error = %e, "Storage job panicked");
      }
    }
    debug!(target: "practice_backend", "Storage task stopped");
  });
  tx
}

fn run_storage_job(job: StorageJob, store: Option<&StatsStore>, archive: Option<&Archive>) {
  match job {
    StorageJob::SaveStats(stats) => {
      if let Some(store) = store {
        if let Err(e) = store.save(&stats) {
          error!(target: "stats", error = %e, "Failed to persist stats");
        }
      }
    }
    StorageJob::AppendProblem(record) => {
      if let Some(archive) = archive {
        if let Err(e) = archive.append_problem(&record) {
          error!(target: "practice_backend", error = %e, "Failed to archive problem");
        }
      }
    }
    StorageJob::AppendSubmission(record) => {
      if let Some(archive) = archive {
        if let Err(e) = archive.append_submission(&record) {
          error!(target: "practice_backend", error = %e, "Failed to archive submission");
        }
      }
    }
    StorageJob::PickReview { ranking, reply } => {
      let picked = match archive {
        Some(archive) => archive.pick_review(&ranking),
        None => Err(PracticeError::Archive("archive is not available".into())),
      };
      // The requester may already be gone.
      let _ = reply.send(picked);
    }
  }
}

async fn with_timeout<T>(operation: &'static str, after: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
  match tokio::time::timeout(after, fut).await {
    Ok(result) => result,
    Err(_) => Err(PracticeError::Timeout { operation, after }),
  }
}
