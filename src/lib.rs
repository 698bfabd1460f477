pub mod agent;
pub mod answer;
pub mod auth;
#[cfg(feature = "tauri")]
mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod normalize;
pub mod orchestrator;
pub mod serializer;
pub mod session;
pub mod state;
pub mod table;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides the default level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("allytics=info"));
    // A second call (tests, embedding hosts) keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(feature = "tauri")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use commands::{account, chat, files, settings};
    use config::AppConfig;
    use db::Database;
    use state::AppState;
    use tauri::Manager;

    init_tracing();
    let config = AppConfig::from_env();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(move |app| {
            let database = match &config.db_path {
                Some(path) => Database::open(path)?,
                None => Database::new(&app.path().app_data_dir()?)?,
            };
            app.manage(AppState::new(database, config.clone()));
            tracing::info!("allytics ready");
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            account::login,
            account::register,
            account::logout,
            account::current_user,
            account::save_session,
            files::upload_file,
            files::list_files,
            files::switch_file,
            files::delete_current_file,
            files::clear_chat,
            files::preview_file,
            chat::ask_question,
            chat::cancel_question,
            chat::get_history,
            settings::get_settings,
            settings::set_setting,
            settings::delete_setting,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
