// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The lifecycle engine: FSM + timers + meter + bus handle wired into the
//! canonical six-stage lifecycle.
//!
//! Two planes run in parallel. The FSM driver task walks
//! PREPARE → CONFIGURE → CONNECT → EXECUTE with RECOVER/DISCONNECT on the
//! failure path; the manage plane ticks `on_manage` on its own timer and
//! never changes lifecycle state. SIGTERM converts to a clean stop.

use crate::args::AppArgs;
use crate::fsm::{Directive, DriveError, Fsm, StateDriver};
use crate::hooks::{AppHooks, StageError};
use crate::EngineError;
use async_trait::async_trait;
use ne_adapters::TagBus;
use ne_core::{AppState, AppStats, Clock, PeriodicTimer, StageGuard, SystemClock};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Delay before a reconnect attempt once something has failed.
    pub retry_delay: Duration,
    /// Cadence of EXECUTE ticks.
    pub execute_interval: Duration,
    /// Cadence of the manage plane.
    pub manage_interval: Duration,
    /// Failures logged in full per unsuccessful stretch; the rest are
    /// suppressed until the next clean EXECUTE iteration.
    pub exception_limit: u32,
    /// How long `stop` waits for the in-flight handler.
    pub stop_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(3),
            execute_interval: Duration::from_secs(1),
            manage_interval: Duration::from_secs(1),
            exception_limit: 1,
            stop_timeout: Duration::from_secs(5),
        }
    }
}

/// Creates the bus client instance during PREPARE.
pub type BusFactory = Arc<dyn Fn(&str, &AppArgs) -> Arc<dyn TagBus> + Send + Sync>;

/// Shared engine context handed to every hook.
pub struct AppCtx {
    app_id: String,
    args: AppArgs,
    bus: Mutex<Option<Arc<dyn TagBus>>>,
    stats: Mutex<AppStats>,
    state: Mutex<Option<AppState>>,
    reconfigure: AtomicBool,
    exit_code: Mutex<Option<i32>>,
    stop: Arc<AtomicBool>,
}

impl AppCtx {
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn args(&self) -> &AppArgs {
        &self.args
    }

    /// The bus handle. Created in PREPARE; absent before that.
    pub fn bus(&self) -> Result<Arc<dyn TagBus>, EngineError> {
        self.bus.lock().clone().ok_or(EngineError::BusNotReady)
    }

    pub(crate) fn set_bus(&self, bus: Arc<dyn TagBus>) {
        *self.bus.lock() = Some(bus);
    }

    /// Snapshot of the engine statistics.
    pub fn stats(&self) -> AppStats {
        self.stats.lock().clone()
    }

    pub(crate) fn stats_mutex(&self) -> &Mutex<AppStats> {
        &self.stats
    }

    pub fn current_state(&self) -> Option<AppState> {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: AppState) {
        *self.state.lock() = Some(state);
    }

    /// One-shot reconfigure signal: the next EXECUTE tick diverts through
    /// CONFIGURE. Setting it twice before the tick is the same as once.
    pub fn request_reconfigure(&self) {
        self.reconfigure.store(true, Ordering::SeqCst);
    }

    pub(crate) fn take_reconfigure(&self) -> bool {
        self.reconfigure.swap(false, Ordering::SeqCst)
    }

    pub fn reconfigure_pending(&self) -> bool {
        self.reconfigure.load(Ordering::SeqCst)
    }

    /// Stop the engine and make `run` return `code`. Used by workers to
    /// hand a restart to the service manager (code 0).
    pub fn request_exit(&self, code: i32) {
        *self.exit_code.lock() = Some(code);
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn exit_code(&self) -> Option<i32> {
        *self.exit_code.lock()
    }
}

/// One engine instance.
pub struct App<H: AppHooks, C: Clock = SystemClock> {
    ctx: Arc<AppCtx>,
    hooks: Arc<H>,
    fsm: Arc<Fsm>,
    config: AppConfig,
    clock: C,
    bus_factory: BusFactory,
}

impl<H: AppHooks> App<H, SystemClock> {
    pub fn new(
        app_id: impl Into<String>,
        args: AppArgs,
        config: AppConfig,
        hooks: H,
        bus_factory: BusFactory,
    ) -> Self {
        Self::with_clock(app_id, args, config, hooks, bus_factory, SystemClock)
    }
}

impl<H: AppHooks, C: Clock> App<H, C> {
    pub fn with_clock(
        app_id: impl Into<String>,
        args: AppArgs,
        config: AppConfig,
        hooks: H,
        bus_factory: BusFactory,
        clock: C,
    ) -> Self {
        let fsm = Arc::new(Fsm::new());
        let ctx = Arc::new(AppCtx {
            app_id: app_id.into(),
            args,
            bus: Mutex::new(None),
            stats: Mutex::new(AppStats::new()),
            state: Mutex::new(None),
            reconfigure: AtomicBool::new(false),
            exit_code: Mutex::new(None),
            stop: fsm.stop_flag(),
        });
        Self {
            ctx,
            hooks: Arc::new(hooks),
            fsm,
            config,
            clock,
            bus_factory,
        }
    }

    pub fn ctx(&self) -> &Arc<AppCtx> {
        &self.ctx
    }

    pub fn hooks(&self) -> &Arc<H> {
        &self.hooks
    }

    pub fn fsm(&self) -> &Arc<Fsm> {
        &self.fsm
    }

    pub fn is_running(&self) -> bool {
        self.fsm.is_running()
    }

    /// Spawn the FSM driver at PREPARE.
    pub fn start(&self) {
        if self.fsm.is_running() {
            return;
        }

        let app_id = self.ctx.app_id.clone();
        let state_ctx = Arc::clone(&self.ctx);
        self.fsm.on_transition(move |prev, next| {
            state_ctx.set_state(next);
            tracing::debug!(app_id = %app_id, "state: {prev} -> {next}");
        });

        let app_id = self.ctx.app_id.clone();
        self.fsm.on_error(move |err| {
            tracing::error!(app_id = %app_id, error = %err, "fsm error");
        });

        self.ctx.set_state(AppState::Prepare);
        let driver = EngineDriver {
            ctx: Arc::clone(&self.ctx),
            hooks: Arc::clone(&self.hooks),
            fsm: Arc::clone(&self.fsm),
            config: self.config.clone(),
            clock: self.clock.clone(),
            execute_timer: PeriodicTimer::new(self.clock.clone(), self.config.execute_interval),
            bus_factory: Arc::clone(&self.bus_factory),
            cleaned: false,
        };
        self.fsm.start(AppState::Prepare, driver);
    }

    /// Request shutdown and wait for the driver to exit.
    pub async fn stop(&self) {
        self.fsm.stop(self.config.stop_timeout).await;
    }

    /// Run to completion: start the FSM, drive the manage plane on this
    /// task, tear down, and return the process exit code.
    pub async fn run(&self) -> i32 {
        self.start();
        install_signal_handlers(Arc::clone(&self.fsm));

        let mut manage_timer = PeriodicTimer::new(self.clock.clone(), self.config.manage_interval);
        let mut running = self.fsm.running_receiver();
        while self.fsm.is_running() {
            tokio::select! {
                _ = manage_timer.wait() => {
                    if !self.fsm.is_running() {
                        break;
                    }
                    if let Err(err) = self.hooks.on_manage(&self.ctx).await {
                        note_failure(&self.ctx, self.config.exception_limit, "manage", &err);
                    }
                }
                _ = running.changed() => {}
            }
        }

        // Best-effort teardown: the driver may have stopped mid-cycle.
        if let Err(err) = self.hooks.on_disconnect(&self.ctx).await {
            tracing::warn!(error = %err, "final disconnect failed");
        }
        if let Ok(bus) = self.ctx.bus() {
            let _ = bus.disconnect().await;
        }

        self.ctx.exit_code().unwrap_or(0)
    }
}

#[cfg(unix)]
fn install_signal_handlers(fsm: Arc<Fsm>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (Ok(mut sigterm), Ok(mut sigint)) = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) else {
            tracing::warn!("signal handler installation failed");
            return;
        };
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, stopping"),
            _ = sigint.recv() => tracing::info!("received SIGINT, stopping"),
        }
        fsm.request_stop();
    });
}

#[cfg(not(unix))]
fn install_signal_handlers(_fsm: Arc<Fsm>) {}

/// Count one failure and log it within the exception budget.
fn note_failure(ctx: &AppCtx, limit: u32, stage: &str, err: &StageError) {
    let count = ctx.stats_mutex().lock().record_exception();
    if count <= limit {
        tracing::warn!(stage, error = %err, count, limit, "stage failed");
    } else {
        tracing::debug!(stage, error = %err, count, "stage failed (suppressed)");
    }
}

/// The per-state handler table of the engine.
struct EngineDriver<H: AppHooks, C: Clock> {
    ctx: Arc<AppCtx>,
    hooks: Arc<H>,
    fsm: Arc<Fsm>,
    config: AppConfig,
    clock: C,
    execute_timer: PeriodicTimer<C>,
    bus_factory: BusFactory,
    cleaned: bool,
}

#[async_trait]
impl<H: AppHooks, C: Clock> StateDriver for EngineDriver<H, C> {
    async fn drive(&mut self, state: AppState) -> Result<Directive, DriveError> {
        Ok(match state {
            AppState::Prepare => self.prepare().await,
            AppState::Configure => self.configure().await,
            AppState::Connect => self.connect().await,
            AppState::Execute => self.execute().await,
            AppState::Recover => self.recover().await,
            AppState::Disconnect => self.disconnect().await,
        })
    }
}

impl<H: AppHooks, C: Clock> EngineDriver<H, C> {
    fn fatal(&self, stage: &str, err: &StageError) -> Directive {
        tracing::error!(app_id = %self.ctx.app_id(), stage, error = %err, "fatal failure, stopping");
        self.ctx.request_exit(1);
        Directive::Stop
    }

    async fn prepare(&mut self) -> Directive {
        let _guard = StageGuard::new(&self.clock, self.ctx.stats_mutex(), AppState::Prepare);
        tracing::info!(app_id = %self.ctx.app_id(), "preparing");

        let bus = (self.bus_factory)(self.ctx.app_id(), self.ctx.args());
        self.ctx.set_bus(bus);

        match self.hooks.on_prepare(&self.ctx).await {
            Ok(()) => {
                self.ctx.stats_mutex().lock().mark_done(AppState::Prepare);
                Directive::Transition(AppState::Configure)
            }
            Err(err) => self.fatal("prepare", &err),
        }
    }

    async fn configure(&mut self) -> Directive {
        let _guard = StageGuard::new(&self.clock, self.ctx.stats_mutex(), AppState::Configure);
        match self.hooks.on_configure(&self.ctx).await {
            Ok(()) => {
                if self.ctx.stats_mutex().lock().mark_done(AppState::Configure) {
                    tracing::info!(app_id = %self.ctx.app_id(), "configured");
                }
                Directive::Transition(AppState::Connect)
            }
            Err(err) => self.fatal("configure", &err),
        }
    }

    async fn connect(&mut self) -> Directive {
        // Back off before reattempting once something has failed.
        if self.ctx.stats_mutex().lock().exception_count >= 1 {
            tokio::time::sleep(self.config.retry_delay).await;
            if self.fsm.stop_requested() {
                return Directive::Stop;
            }
        }

        let result = {
            let _guard = StageGuard::new(&self.clock, self.ctx.stats_mutex(), AppState::Connect);
            Self::open_session(&self.ctx, &self.hooks, &mut self.cleaned).await
        };

        match result {
            Ok(()) => {
                if self.ctx.stats_mutex().lock().mark_done(AppState::Connect) {
                    tracing::info!(app_id = %self.ctx.app_id(), "connected");
                }
                Directive::Transition(AppState::Execute)
            }
            Err(err) => {
                note_failure(&self.ctx, self.config.exception_limit, "connect", &err);
                Directive::Transition(AppState::Recover)
            }
        }
    }

    async fn open_session(
        ctx: &Arc<AppCtx>,
        hooks: &Arc<H>,
        cleaned: &mut bool,
    ) -> Result<(), StageError> {
        let bus = ctx.bus().map_err(StageError::recoverable)?;
        bus.connect().await?;
        if ctx.args().clean && !*cleaned {
            bus.clear().await?;
            *cleaned = true;
        }
        hooks.on_connect(ctx).await
    }

    async fn execute(&mut self) -> Directive {
        self.execute_timer.reset();
        loop {
            if self.fsm.stop_requested() {
                return Directive::Stop;
            }
            self.execute_timer.wait().await;
            if self.fsm.stop_requested() {
                return Directive::Stop;
            }

            // Consume the one-shot reconfigure signal before the handler.
            if self.ctx.take_reconfigure() {
                tracing::info!(app_id = %self.ctx.app_id(), "reconfigure requested");
                self.ctx.stats_mutex().lock().clear_done(AppState::Configure);
                return Directive::Transition(AppState::Configure);
            }

            let started = self.clock.now();
            match self.hooks.on_execute(&self.ctx).await {
                Ok(()) => {
                    let elapsed = self.clock.now().duration_since(started).as_secs_f64();
                    let mut stats = self.ctx.stats_mutex().lock();
                    stats.stage_mut(AppState::Execute).elapsed_s = elapsed;
                    stats.execute_meter.record(elapsed);
                    stats.execute_count += 1;
                    stats.reset_exceptions();
                    if stats.mark_done(AppState::Execute) {
                        stats.clear_done(AppState::Recover);
                        stats.clear_done(AppState::Disconnect);
                        drop(stats);
                        tracing::info!(app_id = %self.ctx.app_id(), "executing");
                    }
                }
                Err(err) => {
                    note_failure(&self.ctx, self.config.exception_limit, "execute", &err);
                    return Directive::Transition(AppState::Recover);
                }
            }
        }
    }

    async fn recover(&mut self) -> Directive {
        let result = {
            let _guard = StageGuard::new(&self.clock, self.ctx.stats_mutex(), AppState::Recover);
            self.hooks.on_recover(&self.ctx).await
        };
        match result {
            Ok(()) => {
                if self.ctx.stats_mutex().lock().mark_done(AppState::Recover) {
                    tracing::info!(app_id = %self.ctx.app_id(), "recovered");
                }
                Directive::Transition(AppState::Execute)
            }
            Err(err) => {
                tracing::warn!(app_id = %self.ctx.app_id(), error = %err, "recovery failed");
                Directive::Transition(AppState::Disconnect)
            }
        }
    }

    async fn disconnect(&mut self) -> Directive {
        // Reset the cycle's done flags so the next attempt re-logs entry.
        {
            let mut stats = self.ctx.stats_mutex().lock();
            stats.clear_done(AppState::Connect);
            stats.clear_done(AppState::Execute);
        }

        {
            let _guard = StageGuard::new(&self.clock, self.ctx.stats_mutex(), AppState::Disconnect);
            if let Err(err) = self.hooks.on_disconnect(&self.ctx).await {
                tracing::warn!(app_id = %self.ctx.app_id(), error = %err, "disconnect hook failed");
            }
            // The bus session goes down unconditionally.
            if let Ok(bus) = self.ctx.bus() {
                let _ = bus.disconnect().await;
            }
            if self.ctx.stats_mutex().lock().mark_done(AppState::Disconnect) {
                tracing::warn!(app_id = %self.ctx.app_id(), "disconnected");
            }
        }

        tokio::time::sleep(self.config.retry_delay).await;
        if self.fsm.stop_requested() {
            return Directive::Stop;
        }
        Directive::Transition(AppState::Connect)
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
