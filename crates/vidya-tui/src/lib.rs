pub mod app;
pub mod log_layer;
pub mod ui;

use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use tokio::sync::{mpsc, watch};
use vidya_core::{SessionView, UiCommand};

pub use app::App;
pub use log_layer::{LogBuffer, TuiLogLayer};

/// Run the TUI event loop. Blocks until the user quits.
pub async fn run(
    mut view_rx: watch::Receiver<SessionView>,
    cmd_tx: mpsc::UnboundedSender<UiCommand>,
    log_buffer: LogBuffer,
) -> std::io::Result<()> {
    let mut terminal = ratatui::init();
    let result = run_loop(&mut terminal, &mut view_rx, &cmd_tx, log_buffer).await;
    ratatui::restore();
    result
}

async fn run_loop(
    terminal: &mut DefaultTerminal,
    view_rx: &mut watch::Receiver<SessionView>,
    cmd_tx: &mpsc::UnboundedSender<UiCommand>,
    log_buffer: LogBuffer,
) -> std::io::Result<()> {
    let mut app = App::new(log_buffer);

    loop {
        if view_rx.has_changed().unwrap_or(false) {
            app.update_view(view_rx.borrow_and_update().clone());
        }

        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Short poll so view changes re-render promptly.
        if event::poll(std::time::Duration::from_millis(33))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match app.handle_key(key) {
                        app::AppAction::Quit => {
                            let _ = cmd_tx.send(UiCommand::Quit);
                            break;
                        }
                        app::AppAction::Command(cmd) => {
                            let _ = cmd_tx.send(cmd);
                        }
                        app::AppAction::None => {}
                    }
                }
            }
        }
    }

    Ok(())
}
