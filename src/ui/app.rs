use std::time::Duration;

use chrono::Utc;
use eframe::egui;
use tokio::sync::mpsc;

use crate::common::{AuthUser, ChatEvent};
use crate::network::ChatSession;

use super::components::{chat_area, header, input_bar, notices};
use super::state::{SendOutcome, WidgetState, WidgetView};

const REPAINT_INTERVAL: Duration = Duration::from_secs(1);

pub struct ChatApp {
    state: WidgetState,
    user: Option<AuthUser>,
    session: ChatSession,
    event_receiver: mpsc::Receiver<ChatEvent>,
}

impl ChatApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        user: Option<AuthUser>,
        session: ChatSession,
        event_receiver: mpsc::Receiver<ChatEvent>,
    ) -> Self {
        Self {
            state: WidgetState::new(),
            user,
            session,
            event_receiver,
        }
    }

    fn handle_chat_events(&mut self) {
        while let Ok(event) = self.event_receiver.try_recv() {
            self.state.apply_event(event, Utc::now());
        }
        self.state.expire_notices(Utc::now());
    }

    fn submit(&mut self) {
        match self.state.prepare_send(self.user.as_ref(), Utc::now()) {
            SendOutcome::Emit(command) => self.session.send(command),
            SendOutcome::Ignored => {}
            SendOutcome::Rejected => log::info!("Send rejected: no signed-in user"),
        }
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_chat_events();

        egui::TopBottomPanel::top("chat_header").show(ctx, |ui| {
            if header::render(ui, &self.state) {
                self.state.toggle_view();
            }
        });

        if self.state.view == WidgetView::Expanded {
            egui::TopBottomPanel::bottom("chat_input").show(ctx, |ui| {
                notices::render(ui, &self.state.notices);
                if input_bar::render(ui, &mut self.state.input_text, self.user.is_some()) {
                    self.submit();
                }
            });
        }

        egui::CentralPanel::default().show(ctx, |ui| match self.state.view {
            WidgetView::Expanded => chat_area::render(ui, &self.state.messages, Utc::now()),
            WidgetView::Collapsed => {
                notices::render(ui, &self.state.notices);
                ui.label(format!(
                    "{} recent messages, expand to read",
                    self.state.messages.len()
                ));
            }
        });

        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}
