use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

/// IDs personalizados para los botones
pub mod button_ids {
    pub const PAUSE: &str = "player_pause";
    pub const RESUME: &str = "player_resume";
    pub const SKIP: &str = "player_skip";
    pub const STOP: &str = "player_stop";
    pub const SHUFFLE: &str = "player_shuffle";
    pub const QUEUE: &str = "player_queue";

    /// Prefijo de la paginación de la cola; el resto del id es la página destino.
    pub const QUEUE_PAGE_PREFIX: &str = "queue_page:";
}

/// Controles que acompañan al display de "sonando ahora"
pub fn create_player_controls() -> Vec<CreateActionRow> {
    let pause_btn = CreateButton::new(button_ids::PAUSE)
        .emoji('⏸')
        .style(ButtonStyle::Primary);

    let resume_btn = CreateButton::new(button_ids::RESUME)
        .emoji('▶')
        .style(ButtonStyle::Primary);

    let skip_btn = CreateButton::new(button_ids::SKIP)
        .emoji('⏭')
        .style(ButtonStyle::Secondary);

    let stop_btn = CreateButton::new(button_ids::STOP)
        .emoji('⏹')
        .style(ButtonStyle::Danger);

    let shuffle_btn = CreateButton::new(button_ids::SHUFFLE)
        .emoji('🔀')
        .style(ButtonStyle::Secondary);

    let queue_btn = CreateButton::new(button_ids::QUEUE)
        .label("Cola")
        .emoji('📋')
        .style(ButtonStyle::Secondary);

    vec![
        CreateActionRow::Buttons(vec![pause_btn, resume_btn, skip_btn, stop_btn, shuffle_btn]),
        CreateActionRow::Buttons(vec![queue_btn]),
    ]
}

/// Botones de navegación para `/queue`
pub fn create_navigation_buttons(current_page: usize, total_pages: usize) -> CreateActionRow {
    let prev_btn = CreateButton::new(page_id(current_page.saturating_sub(1).max(1)))
        .emoji('◀')
        .style(ButtonStyle::Primary)
        .disabled(current_page <= 1);

    let page_btn = CreateButton::new("queue_page_info")
        .label(format!("{}/{}", current_page, total_pages))
        .style(ButtonStyle::Secondary)
        .disabled(true);

    let next_btn = CreateButton::new(page_id((current_page + 1).min(total_pages)))
        .emoji('▶')
        .style(ButtonStyle::Primary)
        .disabled(current_page >= total_pages);

    CreateActionRow::Buttons(vec![prev_btn, page_btn, next_btn])
}

fn page_id(page: usize) -> String {
    format!("{}{}", button_ids::QUEUE_PAGE_PREFIX, page)
}

/// Página destino de un botón de navegación de la cola
pub fn parse_page_id(custom_id: &str) -> Option<usize> {
    custom_id
        .strip_prefix(button_ids::QUEUE_PAGE_PREFIX)?
        .parse()
        .ok()
}
