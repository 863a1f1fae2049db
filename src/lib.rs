pub mod config;
pub mod controller;
pub mod db;
pub mod documents;
pub mod models;
pub mod notice;
pub mod remote;
pub mod server;
pub mod session;
pub mod sheets;
pub mod upload;

#[cfg(feature = "desktop")]
mod commands;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tetrix_chat_lib=info,tetrix_chat=info"));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init();
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use tauri::{Emitter, Manager};

    init_logging();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let app_dir = app.path().app_data_dir()?;
            let database = db::Database::new(&app_dir)?;
            let settings = config::Settings::load(&database, &app_dir)?;
            let (controller, mut notices) = controller::Controller::new(&settings);

            let handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                while let Some(notice) = notices.recv().await {
                    let _ = handle.emit("notice", &notice);
                }
            });

            app.manage(commands::AppState {
                controller,
                db: database,
                data_dir: app_dir,
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::chat::get_messages,
            commands::chat::load_history,
            commands::chat::send_message,
            commands::chat::feedback_target,
            commands::chat::thumbs_up,
            commands::chat::thumbs_down,
            commands::chat::resubmit,
            commands::documents::list_documents,
            commands::documents::refresh_documents,
            commands::documents::delete_document,
            commands::documents::prepare_upload,
            commands::documents::upload_document,
            commands::settings::get_settings,
            commands::settings::get_stored_settings,
            commands::settings::set_setting,
            commands::settings::delete_setting,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
