use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::audio::pipeline::TrackStreamer;
use crate::audio::registry::{PlayerDeps, PlayerRegistry};
use crate::audio::{Notifier, StreamOutcome, JOIN_SETTLE};
use crate::error::PlayerError;
use crate::sources::Track;
use crate::voice::{VoiceConnection, VoiceGateway};

/// Reproductor de una guild: cola FIFO, pista actual y la máquina de
/// estados reproducir/pausar/saltar/repetir/parar.
///
/// Todo el estado vive tras un único candado que solo se retiene en
/// secciones críticas cortas; el trabajo real (decodificar, codificar,
/// enviar) ocurre en la tarea de reproducción en segundo plano.
pub struct GuildPlayer {
    guild_id: GuildId,
    deps: Arc<PlayerDeps>,
    registry: Weak<PlayerRegistry>,
    weak: Weak<GuildPlayer>,
    state: Mutex<PlayerState>,
}

#[derive(Default)]
struct PlayerState {
    queue: VecDeque<Track>,
    current: Option<Track>,
    looping: bool,
    playing: bool,
    paused: bool,
    cancel: Option<CancellationToken>,
    pause_tx: Option<watch::Sender<bool>>,
    voice: Option<Arc<VoiceConnection>>,
    idle_timer: Option<CancellationToken>,
}

/// Instantánea del estado para la capa de comandos.
#[derive(Debug, Clone)]
pub struct PlayerStatus {
    pub current: Option<Track>,
    pub queue_len: usize,
    pub looping: bool,
    pub paused: bool,
}

impl GuildPlayer {
    pub(crate) fn new(
        guild_id: GuildId,
        deps: Arc<PlayerDeps>,
        registry: Weak<PlayerRegistry>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            guild_id,
            deps,
            registry,
            weak: weak.clone(),
            state: Mutex::new(PlayerState::default()),
        })
    }

    /// Une el reproductor al canal de voz indicado.
    ///
    /// Idempotente si ya está en ese canal; en otro caso libera la conexión
    /// previa, establece la nueva y espera un margen breve a que el
    /// transporte se estabilice.
    pub async fn ensure_connected(&self, channel_id: ChannelId) -> Result<(), PlayerError> {
        let previous = {
            let state = self.state.lock();
            match &state.voice {
                Some(conn) if conn.channel_id() == channel_id => return Ok(()),
                other => other.clone(),
            }
        };

        if let Some(old) = previous {
            old.disconnect();
        }

        let connection = self.deps.gateway.join(self.guild_id, channel_id).await?;
        tokio::time::sleep(JOIN_SETTLE).await;

        let mut state = self.state.lock();
        state.voice = Some(Arc::new(connection));
        if !state.playing {
            // Inactivo con transporte recién ligado: el temporizador de
            // desconexión queda armado hasta que llegue la primera pista.
            self.schedule_disconnect_locked(&mut state);
        }
        info!("🔊 Conectado al canal de voz {channel_id} en guild {}", self.guild_id);
        Ok(())
    }

    /// Añade la pista a la cola y arranca la tarea de reproducción si el
    /// reproductor estaba inactivo.
    ///
    /// Devuelve la posición 1-based que ocupa la pista contando la que
    /// esté sonando. Nunca bloquea sobre el pipeline.
    pub fn enqueue(&self, track: Track) -> Result<usize, PlayerError> {
        let mut state = self.state.lock();
        if state.queue.len() >= self.deps.config.max_queue_size {
            return Err(PlayerError::QueueFull(self.deps.config.max_queue_size));
        }

        info!("➕ En cola: {}", track.label());
        state.queue.push_back(track);
        Self::cancel_disconnect_locked(&mut state);

        let position = state.queue.len() + usize::from(state.current.is_some());

        if !state.playing {
            if let Some(player) = self.weak.upgrade() {
                state.playing = true;
                tokio::spawn(player.play_loop());
            }
        }

        Ok(position)
    }

    /// Salta la pista actual. Saltar una pista en bucle desactiva el bucle.
    /// Devuelve si había algo que saltar.
    pub fn skip(&self) -> bool {
        let mut state = self.state.lock();
        let active = state.current.is_some();
        if let Some(cancel) = state.cancel.clone() {
            state.looping = false;
            cancel.cancel();
            debug!("⏭️ Salto solicitado en guild {}", self.guild_id);
        }
        active
    }

    /// Alterna la pausa del pipeline. Devuelve el nuevo estado, o `false`
    /// como no-op si no hay nada sonando.
    pub fn pause(&self) -> bool {
        let mut state = self.state.lock();
        if state.current.is_none() {
            return false;
        }
        let Some(pause_tx) = state.pause_tx.clone() else {
            return false;
        };
        state.paused = !state.paused;
        let _ = pause_tx.send(state.paused);
        state.paused
    }

    /// Vacía la cola, descarta la pista actual y cancela el pipeline.
    /// Devuelve si había algo que parar.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        let had_work = state.current.is_some() || !state.queue.is_empty();

        state.queue.clear();
        state.current = None;
        state.looping = false;
        state.paused = false;
        if let Some(pause_tx) = &state.pause_tx {
            // Despierta a un pipeline pausado para que observe la cancelación.
            let _ = pause_tx.send(false);
        }
        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }

        if had_work {
            info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
        }
        had_work
    }

    /// Alterna (o fija, si `explicit` viene dado) el modo bucle. Activar el
    /// bucle sin pista actual siempre resulta en `false`.
    pub fn toggle_loop(&self, explicit: Option<bool>) -> bool {
        let mut state = self.state.lock();
        match explicit {
            Some(value) => state.looping = value && state.current.is_some(),
            None if state.current.is_some() => state.looping = !state.looping,
            None => {}
        }
        state.looping
    }

    pub fn status(&self) -> PlayerStatus {
        let state = self.state.lock();
        PlayerStatus {
            current: state.current.clone(),
            queue_len: state.queue.len(),
            looping: state.looping,
            paused: state.paused,
        }
    }

    /// Cancela cualquier pipeline activo y libera el transporte. Se usa en
    /// el apagado global del proceso.
    pub fn shutdown(&self) {
        let connection = {
            let mut state = self.state.lock();
            if let Some(cancel) = state.cancel.take() {
                cancel.cancel();
            }
            Self::cancel_disconnect_locked(&mut state);
            state.voice.take()
        };
        if let Some(connection) = connection {
            connection.disconnect();
        }
    }

    /// Tarea de reproducción: una por reproductor activo. Extrae pistas,
    /// ejecuta el pipeline y decide entre repetir, avanzar o quedar
    /// inactivo.
    async fn play_loop(self: Arc<Self>) {
        loop {
            let Some((track, repeated)) = self.next_track() else {
                let mut state = self.state.lock();
                state.playing = false;
                self.schedule_disconnect_locked(&mut state);
                debug!("📭 Cola vacía en guild {}, reproductor inactivo", self.guild_id);
                return;
            };

            let cancel = CancellationToken::new();
            let (pause_tx, pause_rx) = watch::channel(false);
            let (voice, looping) = {
                let mut state = self.state.lock();
                state.cancel = Some(cancel.clone());
                state.pause_tx = Some(pause_tx);
                state.paused = false;
                (state.voice.clone(), state.looping)
            };

            if !repeated {
                info!("🎵 Reproduciendo: {}", track.label());
                let notifier = self.deps.notifier.clone();
                let announced = track.clone();
                tokio::spawn(async move {
                    notifier.now_playing(&announced, looping).await;
                });
            }

            let outcome = match voice {
                Some(connection) => {
                    self.deps
                        .streamer
                        .stream(connection, &track, cancel.clone(), pause_rx)
                        .await
                }
                None => Err(crate::error::PipelineError::NoConnection),
            };

            {
                let mut state = self.state.lock();
                state.cancel = None;
                state.pause_tx = None;
                state.paused = false;
            }

            match outcome {
                Ok(StreamOutcome::Completed) => {
                    debug!("✅ Pista terminada: {}", track.label());
                }
                Ok(StreamOutcome::Canceled) => {
                    debug!("🚫 Pipeline cancelado en guild {}", self.guild_id);
                }
                Err(e) => {
                    // Un fallo del pipeline no tumba al reproductor: se
                    // avanza como si la pista hubiese terminado.
                    error!("Error de reproducción en guild {}: {e}", self.guild_id);
                }
            }
        }
    }

    /// Selecciona la siguiente pista bajo el candado.
    ///
    /// Con el bucle activo la pista recién terminada se reinserta al final
    /// de la cola antes de extraer la cabeza; `repeated` indica que volvió
    /// a salir la misma pista seguida (cola de un solo elemento).
    fn next_track(&self) -> Option<(Track, bool)> {
        let mut state = self.state.lock();

        let mut repeated = false;
        if state.looping {
            if let Some(finished) = state.current.take() {
                repeated = state.queue.is_empty();
                state.queue.push_back(finished);
            }
        }

        match state.queue.pop_front() {
            Some(track) => {
                state.current = Some(track.clone());
                Some((track, repeated))
            }
            None => {
                state.current = None;
                None
            }
        }
    }

    /// Arma el temporizador de desconexión por inactividad. Solo tiene
    /// sentido con un transporte ligado; requiere el candado del estado.
    fn schedule_disconnect_locked(&self, state: &mut PlayerState) {
        if state.voice.is_none() {
            return;
        }
        Self::cancel_disconnect_locked(state);

        let Some(player) = self.weak.upgrade() else {
            return;
        };
        let token = CancellationToken::new();
        state.idle_timer = Some(token.clone());
        let delay = self.deps.config.idle_disconnect;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => player.evict_idle(token),
            }
        });
    }

    fn cancel_disconnect_locked(state: &mut PlayerState) {
        if let Some(timer) = state.idle_timer.take() {
            timer.cancel();
        }
    }

    /// Disparo del temporizador: libera el transporte y retira este
    /// reproductor del registro. Toma el mismo candado que el resto de
    /// mutadores, de modo que la carrera con un `enqueue` tardío se
    /// resuelve de forma determinista.
    fn evict_idle(self: Arc<Self>, token: CancellationToken) {
        let connection = {
            let mut state = self.state.lock();
            if token.is_cancelled() || state.playing {
                return;
            }
            state.idle_timer = None;
            state.voice.take()
        };

        if let Some(connection) = connection {
            connection.disconnect();
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.guild_id, &self);
        }
        info!("👋 Desconectado por inactividad en guild {}", self.guild_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::pipeline::{StreamOutcome, TrackStreamer};
    use crate::audio::registry::{PlayerDeps, PlayerRegistry};
    use crate::audio::{MockNotifier, Notifier};
    use crate::config::Config;
    use crate::error::{JoinError, PipelineError};
    use crate::sources::test_track;
    use crate::voice::{VoiceConnection, VoiceGateway, VoiceReceiver};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Gateway de prueba: entrega conexiones reales cuyo extremo driver se
    /// drena en segundo plano.
    struct TestGateway {
        receivers: parking_lot::Mutex<Vec<VoiceReceiver>>,
    }

    impl TestGateway {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                receivers: parking_lot::Mutex::new(Vec::new()),
            })
        }

        fn last_closed(&self) -> Option<bool> {
            self.receivers
                .lock()
                .last()
                .map(|rx| rx.closed.is_cancelled())
        }
    }

    #[async_trait]
    impl VoiceGateway for TestGateway {
        async fn join(
            &self,
            _guild_id: GuildId,
            channel_id: ChannelId,
        ) -> Result<VoiceConnection, JoinError> {
            let (connection, receiver) = VoiceConnection::new(channel_id);
            let frames = receiver.frames.clone();
            tokio::spawn(async move { while frames.recv_async().await.is_ok() {} });
            self.receivers.lock().push(receiver);
            Ok(connection)
        }
    }

    /// Streamer guiado por el test: registra qué pistas arrancan y espera a
    /// la cancelación o a una señal de "pista terminada".
    struct ManualStreamer {
        started: parking_lot::Mutex<Vec<String>>,
        release: Notify,
    }

    impl ManualStreamer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                started: parking_lot::Mutex::new(Vec::new()),
                release: Notify::new(),
            })
        }

        fn started(&self) -> Vec<String> {
            self.started.lock().clone()
        }

        /// Termina "con normalidad" la pista en curso.
        fn finish_current(&self) {
            self.release.notify_one();
        }
    }

    #[async_trait]
    impl TrackStreamer for ManualStreamer {
        async fn stream(
            &self,
            _conn: Arc<VoiceConnection>,
            track: &Track,
            cancel: CancellationToken,
            _pause: tokio::sync::watch::Receiver<bool>,
        ) -> Result<StreamOutcome, PipelineError> {
            self.started.lock().push(track.title.clone());
            tokio::select! {
                _ = cancel.cancelled() => Ok(StreamOutcome::Canceled),
                _ = self.release.notified() => Ok(StreamOutcome::Completed),
            }
        }
    }

    fn quiet_notifier() -> Arc<dyn Notifier> {
        let mut notifier = MockNotifier::new();
        notifier.expect_now_playing().returning(|_, _| ());
        Arc::new(notifier)
    }

    fn build_registry(
        streamer: Arc<dyn TrackStreamer>,
        notifier: Arc<dyn Notifier>,
        idle_disconnect: Duration,
    ) -> (Arc<PlayerRegistry>, Arc<TestGateway>) {
        let config = Arc::new(Config {
            discord_token: "test".to_string(),
            idle_disconnect,
            ..Config::default()
        });
        let gateway = TestGateway::new();
        let registry = PlayerRegistry::new(PlayerDeps {
            config,
            gateway: gateway.clone(),
            streamer,
            notifier,
        });
        (registry, gateway)
    }

    async fn wait_for(mut cond: impl FnMut() -> bool, what: &str) {
        for _ in 0..300 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("tiempo agotado esperando: {what}");
    }

    const GUILD: GuildId = GuildId::new(10);
    const VOICE: ChannelId = ChannelId::new(20);

    #[tokio::test]
    async fn test_enqueue_preserves_fifo_order_and_positions() {
        let streamer = ManualStreamer::new();
        let (registry, _gateway) =
            build_registry(streamer.clone(), quiet_notifier(), Duration::from_secs(90));
        let player = registry.get_or_create(GUILD);
        player.ensure_connected(VOICE).await.unwrap();

        let pos_a = player.enqueue(test_track("a")).unwrap();
        let pos_b = player.enqueue(test_track("b")).unwrap();
        let pos_c = player.enqueue(test_track("c")).unwrap();
        assert_eq!(pos_a, 1);
        assert_eq!(pos_b, 2);
        assert_eq!(pos_c, 3);

        wait_for(|| streamer.started().len() == 1, "arranque de a").await;
        streamer.finish_current();
        wait_for(|| streamer.started().len() == 2, "arranque de b").await;
        streamer.finish_current();
        wait_for(|| streamer.started().len() == 3, "arranque de c").await;
        streamer.finish_current();

        assert_eq!(streamer.started(), vec!["a", "b", "c"]);
        wait_for(|| player.status().current.is_none(), "vuelta a inactivo").await;
    }

    #[tokio::test]
    async fn test_enqueue_position_counts_current_track() {
        let streamer = ManualStreamer::new();
        let (registry, _gateway) =
            build_registry(streamer.clone(), quiet_notifier(), Duration::from_secs(90));
        let player = registry.get_or_create(GUILD);
        player.ensure_connected(VOICE).await.unwrap();

        player.enqueue(test_track("a")).unwrap();
        wait_for(|| streamer.started().len() == 1, "arranque de a").await;
        wait_for(|| player.status().queue_len == 0, "cola drenada").await;

        // `a` sigue sonando: la nueva pista ocupa el puesto 2.
        assert_eq!(player.enqueue(test_track("b")).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_when_queue_is_full() {
        let streamer = ManualStreamer::new();
        let gateway = TestGateway::new();
        let config = Arc::new(Config {
            discord_token: "test".to_string(),
            max_queue_size: 1,
            ..Config::default()
        });
        let registry = PlayerRegistry::new(PlayerDeps {
            config,
            gateway,
            streamer: streamer.clone(),
            notifier: quiet_notifier(),
        });
        let player = registry.get_or_create(GUILD);
        player.ensure_connected(VOICE).await.unwrap();

        player.enqueue(test_track("a")).unwrap();
        wait_for(|| player.status().queue_len == 0, "a pasa a current").await;
        player.enqueue(test_track("b")).unwrap();

        assert!(matches!(
            player.enqueue(test_track("c")),
            Err(PlayerError::QueueFull(1))
        ));
    }

    #[tokio::test]
    async fn test_skip_on_idle_player_is_a_noop() {
        let streamer = ManualStreamer::new();
        let (registry, _gateway) =
            build_registry(streamer.clone(), quiet_notifier(), Duration::from_secs(90));
        let player = registry.get_or_create(GUILD);

        assert!(!player.skip());
        assert_eq!(player.status().queue_len, 0);
    }

    #[tokio::test]
    async fn test_skip_advances_and_cancels_loop() {
        let streamer = ManualStreamer::new();
        let (registry, _gateway) =
            build_registry(streamer.clone(), quiet_notifier(), Duration::from_secs(90));
        let player = registry.get_or_create(GUILD);
        player.ensure_connected(VOICE).await.unwrap();

        player.enqueue(test_track("a")).unwrap();
        player.enqueue(test_track("b")).unwrap();
        wait_for(|| streamer.started().len() == 1, "arranque de a").await;

        assert!(player.toggle_loop(Some(true)));
        assert!(player.skip());

        // El salto desactiva el bucle: `a` no se reinserta y entra `b`.
        wait_for(|| streamer.started().len() == 2, "arranque de b").await;
        assert_eq!(streamer.started(), vec!["a", "b"]);
        assert!(!player.status().looping);
    }

    #[tokio::test]
    async fn test_toggle_loop_requires_a_current_track() {
        let streamer = ManualStreamer::new();
        let (registry, _gateway) =
            build_registry(streamer.clone(), quiet_notifier(), Duration::from_secs(90));
        let player = registry.get_or_create(GUILD);

        // No se puede repetir la nada.
        assert!(!player.toggle_loop(Some(true)));
        assert!(!player.toggle_loop(None));

        player.ensure_connected(VOICE).await.unwrap();
        player.enqueue(test_track("a")).unwrap();
        wait_for(|| streamer.started().len() == 1, "arranque de a").await;

        assert!(player.toggle_loop(Some(true)));
        assert!(!player.toggle_loop(None));
        assert!(player.toggle_loop(None));
    }

    #[tokio::test]
    async fn test_loop_reinserts_finished_track_at_tail() {
        let streamer = ManualStreamer::new();
        let (registry, _gateway) =
            build_registry(streamer.clone(), quiet_notifier(), Duration::from_secs(90));
        let player = registry.get_or_create(GUILD);
        player.ensure_connected(VOICE).await.unwrap();

        player.enqueue(test_track("a")).unwrap();
        player.enqueue(test_track("b")).unwrap();
        wait_for(|| streamer.started().len() == 1, "arranque de a").await;
        player.toggle_loop(Some(true));

        // `a` termina con normalidad: va al final, suena `b`.
        streamer.finish_current();
        wait_for(|| streamer.started().len() == 2, "arranque de b").await;
        // `b` termina: vuelve `a` desde la cola.
        streamer.finish_current();
        wait_for(|| streamer.started().len() == 3, "regreso de a").await;

        assert_eq!(streamer.started(), vec!["a", "b", "a"]);
        assert!(player.status().looping);
    }

    #[tokio::test]
    async fn test_single_track_loop_repeats_without_reannouncing() {
        let streamer = ManualStreamer::new();
        let mut notifier = MockNotifier::new();
        // Una sola pista en bucle se anuncia una única vez.
        notifier
            .expect_now_playing()
            .times(1)
            .returning(|_, _| ());
        let (registry, _gateway) = build_registry(
            streamer.clone(),
            Arc::new(notifier),
            Duration::from_secs(90),
        );
        let player = registry.get_or_create(GUILD);
        player.ensure_connected(VOICE).await.unwrap();

        player.enqueue(test_track("a")).unwrap();
        wait_for(|| streamer.started().len() == 1, "arranque de a").await;
        player.toggle_loop(Some(true));

        streamer.finish_current();
        wait_for(|| streamer.started().len() == 2, "repetición de a").await;
        assert_eq!(streamer.started(), vec!["a", "a"]);
    }

    #[tokio::test]
    async fn test_pause_toggles_strictly() {
        let streamer = ManualStreamer::new();
        let (registry, _gateway) =
            build_registry(streamer.clone(), quiet_notifier(), Duration::from_secs(90));
        let player = registry.get_or_create(GUILD);

        // Sin nada sonando es un no-op.
        assert!(!player.pause());

        player.ensure_connected(VOICE).await.unwrap();
        player.enqueue(test_track("a")).unwrap();
        wait_for(|| streamer.started().len() == 1, "arranque de a").await;

        assert!(player.pause());
        assert!(!player.pause());
        assert!(player.pause());
        assert!(player.status().paused);
    }

    #[tokio::test]
    async fn test_stop_leaves_player_fully_idle() {
        let streamer = ManualStreamer::new();
        let (registry, _gateway) =
            build_registry(streamer.clone(), quiet_notifier(), Duration::from_secs(90));
        let player = registry.get_or_create(GUILD);
        player.ensure_connected(VOICE).await.unwrap();

        player.enqueue(test_track("a")).unwrap();
        player.enqueue(test_track("b")).unwrap();
        player.enqueue(test_track("c")).unwrap();
        wait_for(|| streamer.started().len() == 1, "arranque de a").await;
        player.toggle_loop(Some(true));
        player.pause();

        assert!(player.stop());

        wait_for(
            || {
                let status = player.status();
                status.current.is_none() && status.queue_len == 0
            },
            "estado inactivo tras stop",
        )
        .await;
        let status = player.status();
        assert!(!status.looping);
        assert!(!status.paused);
        assert_eq!(streamer.started(), vec!["a"]); // nada se auto-reproduce

        // Un segundo stop ya no tiene nada que hacer.
        assert!(!player.stop());
    }

    #[tokio::test]
    async fn test_idle_timer_disconnects_and_evicts_player() {
        let streamer = ManualStreamer::new();
        let (registry, gateway) = build_registry(
            streamer.clone(),
            quiet_notifier(),
            Duration::from_millis(80),
        );
        let player = registry.get_or_create(GUILD);
        player.ensure_connected(VOICE).await.unwrap();

        player.enqueue(test_track("a")).unwrap();
        wait_for(|| streamer.started().len() == 1, "arranque de a").await;
        streamer.finish_current();

        wait_for(|| registry.get(GUILD).is_none(), "desalojo del registro").await;
        assert_eq!(gateway.last_closed(), Some(true));

        // Un comando posterior crea un reproductor nuevo.
        let fresh = registry.get_or_create(GUILD);
        assert!(!Arc::ptr_eq(&fresh, &player));
    }

    #[tokio::test]
    async fn test_enqueue_before_expiry_cancels_idle_timer() {
        let streamer = ManualStreamer::new();
        let (registry, gateway) = build_registry(
            streamer.clone(),
            quiet_notifier(),
            Duration::from_millis(200),
        );
        let player = registry.get_or_create(GUILD);
        player.ensure_connected(VOICE).await.unwrap();

        player.enqueue(test_track("a")).unwrap();
        wait_for(|| streamer.started().len() == 1, "arranque de a").await;
        streamer.finish_current();
        wait_for(|| player.status().current.is_none(), "vuelta a inactivo").await;

        // Llega una pista antes de que venza el temporizador.
        tokio::time::sleep(Duration::from_millis(50)).await;
        player.enqueue(test_track("b")).unwrap();
        wait_for(|| streamer.started().len() == 2, "arranque de b").await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(registry.get(GUILD).is_some());
        assert_eq!(gateway.last_closed(), Some(false));
    }

    #[tokio::test]
    async fn test_pipeline_failure_advances_to_next_track() {
        /// Streamer que falla siempre, como un ffmpeg inexistente.
        struct FailingStreamer;

        #[async_trait]
        impl TrackStreamer for FailingStreamer {
            async fn stream(
                &self,
                _conn: Arc<VoiceConnection>,
                _track: &Track,
                _cancel: CancellationToken,
                _pause: tokio::sync::watch::Receiver<bool>,
            ) -> Result<StreamOutcome, PipelineError> {
                Err(PipelineError::Spawn(std::io::Error::other("sin binario")))
            }
        }

        let (registry, _gateway) = build_registry(
            Arc::new(FailingStreamer),
            quiet_notifier(),
            Duration::from_secs(90),
        );
        let player = registry.get_or_create(GUILD);
        player.ensure_connected(VOICE).await.unwrap();

        player.enqueue(test_track("a")).unwrap();
        player.enqueue(test_track("b")).unwrap();

        // Los fallos se contienen: la cola se drena y el reproductor queda
        // utilizable, no colgado.
        wait_for(
            || {
                let status = player.status();
                status.current.is_none() && status.queue_len == 0
            },
            "cola drenada pese a los fallos",
        )
        .await;
        assert!(!player.skip());
    }

    #[tokio::test]
    async fn test_shutdown_releases_transport_and_cancels_pipeline() {
        let streamer = ManualStreamer::new();
        let (registry, gateway) =
            build_registry(streamer.clone(), quiet_notifier(), Duration::from_secs(90));
        let player = registry.get_or_create(GUILD);
        player.ensure_connected(VOICE).await.unwrap();

        player.enqueue(test_track("a")).unwrap();
        wait_for(|| streamer.started().len() == 1, "arranque de a").await;

        player.shutdown();
        assert_eq!(gateway.last_closed(), Some(true));
        wait_for(|| player.status().current.is_none(), "pipeline cancelado").await;
    }
}
