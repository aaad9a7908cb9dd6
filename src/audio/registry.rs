use std::sync::Arc;

use dashmap::DashMap;
use serenity::model::id::GuildId;
use tracing::{debug, info};

use crate::audio::pipeline::TrackStreamer;
use crate::audio::player::GuildPlayer;
use crate::audio::Notifier;
use crate::config::Config;
use crate::voice::VoiceGateway;

/// Servicios compartidos por todos los reproductores.
pub struct PlayerDeps {
    pub config: Arc<Config>,
    pub gateway: Arc<dyn VoiceGateway>,
    pub streamer: Arc<dyn TrackStreamer>,
    pub notifier: Arc<dyn Notifier>,
}

/// Registro guild → reproductor con creación bajo demanda y retirada por
/// inactividad.
///
/// Tiene su propio candado (de lectura mayoritaria), separado del candado
/// de cada reproductor, para que los comandos de guilds distintas no se
/// estorben. Se pasa explícitamente a quien despacha comandos; nunca es un
/// singleton ambiental.
pub struct PlayerRegistry {
    players: DashMap<GuildId, Arc<GuildPlayer>>,
    deps: Arc<PlayerDeps>,
}

impl PlayerRegistry {
    pub fn new(deps: PlayerDeps) -> Arc<Self> {
        Arc::new(Self {
            players: DashMap::new(),
            deps: Arc::new(deps),
        })
    }

    /// Devuelve el reproductor de la guild, creándolo si no existe.
    pub fn get_or_create(self: &Arc<Self>, guild_id: GuildId) -> Arc<GuildPlayer> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("🆕 Creando reproductor para guild {guild_id}");
                GuildPlayer::new(guild_id, self.deps.clone(), Arc::downgrade(self))
            })
            .clone()
    }

    /// Reproductor existente, si lo hay. Los comandos de control no crean
    /// reproductores.
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildPlayer>> {
        self.players.get(&guild_id).map(|entry| entry.clone())
    }

    /// Retira un reproductor del registro.
    ///
    /// Solo lo elimina si la entrada sigue siendo esa misma instancia: un
    /// desalojo rezagado no puede llevarse por delante a un reproductor
    /// recién creado para la misma guild.
    pub(crate) fn remove(&self, guild_id: GuildId, player: &Arc<GuildPlayer>) {
        self.players
            .remove_if(&guild_id, |_, existing| Arc::ptr_eq(existing, player));
    }

    /// Apaga todos los reproductores. Se usa en el cierre del proceso.
    pub fn shutdown_all(&self) {
        let count = self.players.len();
        for entry in self.players.iter() {
            entry.value().shutdown();
        }
        self.players.clear();
        if count > 0 {
            info!("🛑 {count} reproductores apagados");
        }
    }
}
