use atlas_bot::bot::{extract_event, sender_id, TelegramOutbound};
use atlas_bot::config::{Settings, PENDING_CHOICE_MAX_ENTRIES};
use atlas_bot::conversation::MokaPendingStore;
use atlas_bot::convert::Pdf2DocxConverter;
use atlas_bot::handler::MessageHandler;
use atlas_bot::logging::init_logging;
use atlas_bot::media::{Orchestrator, PreviewScraper, YtdlpRunner};
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    init_logging();

    info!("Starting Atlas Bot...");

    let settings = init_settings();

    tokio::fs::create_dir_all(&settings.work_dir).await?;
    info!(work_dir = %settings.work_dir.display(), "Work directory ready.");

    let handler = Arc::new(init_message_handler(&settings)?);

    let bot = Bot::new(settings.telegram_token.clone());

    info!("Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![settings, handler])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_message_handler(settings: &Settings) -> anyhow::Result<MessageHandler> {
    let runner = Arc::new(YtdlpRunner::new(
        settings.ytdlp_path.clone(),
        settings.ytdlp_timeout(),
    ));
    let scraper = Arc::new(PreviewScraper::new(settings.http_timeout())?);
    let downloader = Arc::new(Orchestrator::new(runner, scraper));

    let ttl = settings.pending_choice_ttl();
    info!(
        "Initializing pending choice store (ttl: {:?}, max_size: {})",
        ttl, PENDING_CHOICE_MAX_ENTRIES
    );
    let pending = Arc::new(MokaPendingStore::new(ttl, PENDING_CHOICE_MAX_ENTRIES));

    let converter = Arc::new(Pdf2DocxConverter::new(settings.converter_python.clone()));

    Ok(MessageHandler::new(
        downloader,
        pending,
        converter,
        settings.work_dir.clone(),
        settings.max_inline_media_bytes,
    ))
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .filter(|msg: Message, settings: Arc<Settings>| {
                    settings.is_allowed(sender_id(&msg))
                })
                .endpoint(handle_message),
        )
        .branch(Update::filter_message().endpoint(handle_unauthorized))
}

async fn handle_unauthorized(msg: Message) -> Result<(), teloxide::RequestError> {
    info!(
        user_id = sender_id(&msg),
        chat_id = msg.chat.id.0,
        "Ignoring message from user outside the allow-list"
    );
    respond(())
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    handler: Arc<MessageHandler>,
) -> Result<(), teloxide::RequestError> {
    let out = TelegramOutbound::for_message(bot.clone(), &msg);

    match extract_event(&bot, &msg).await {
        Ok(Some(event)) => {
            if let Err(e) = handler.handle(event, &out).await {
                error!(chat_id = msg.chat.id.0, error = %e, "Failed to deliver reply");
            }
        }
        Ok(None) => {}
        Err(e) => {
            warn!(chat_id = msg.chat.id.0, error = %e, "Failed to read message");
            bot.send_message(msg.chat.id, format!("❌ {e}")).await?;
        }
    }

    respond(())
}
