use serenity::all::ButtonStyle;
use serenity::builder::{CreateActionRow, CreateButton};

/// IDs personalizados para los botones del reproductor
pub mod button_ids {
    pub const PAUSE: &str = "player_pause";
    pub const STOP: &str = "player_stop";
    pub const SKIP: &str = "player_skip";
    pub const LOOP: &str = "player_loop";
}

/// Fila de controles que acompaña a los anuncios y al comando /player.
pub fn player_controls(looping: bool) -> CreateActionRow {
    let (loop_label, loop_style) = if looping {
        ("Desactivar repetición", ButtonStyle::Success)
    } else {
        ("Repetir", ButtonStyle::Secondary)
    };

    CreateActionRow::Buttons(vec![
        CreateButton::new(button_ids::PAUSE)
            .label("Pausa")
            .emoji('⏸')
            .style(ButtonStyle::Secondary),
        CreateButton::new(button_ids::STOP)
            .label("Detener")
            .emoji('⏹')
            .style(ButtonStyle::Danger),
        CreateButton::new(button_ids::SKIP)
            .label("Saltar")
            .emoji('⏭')
            .style(ButtonStyle::Primary),
        CreateButton::new(button_ids::LOOP)
            .label(loop_label)
            .emoji('🔁')
            .style(loop_style),
    ])
}
