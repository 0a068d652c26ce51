use eframe::egui;

use crate::ui::state::{ConnectionStatus, HistoryState, WidgetState, WidgetView};

/// Returns true when the collapse/expand toggle was clicked.
pub fn render(ui: &mut egui::Ui, state: &WidgetState) -> bool {
    let mut toggled = false;
    ui.horizontal(|ui| {
        ui.heading("Campus Chat");

        let (color, label) = status_badge(state.connection);
        ui.colored_label(color, "●");
        ui.label(egui::RichText::new(label).weak());

        if state.history == HistoryState::Loading {
            ui.label(egui::RichText::new("loading history").weak().small());
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            let arrow = match state.view {
                WidgetView::Collapsed => "▲",
                WidgetView::Expanded => "▼",
            };
            if ui.button(arrow).clicked() {
                toggled = true;
            }
        });
    });
    toggled
}

fn status_badge(status: ConnectionStatus) -> (egui::Color32, String) {
    match status {
        ConnectionStatus::Connecting => (egui::Color32::YELLOW, "connecting".to_string()),
        ConnectionStatus::Connected => (egui::Color32::GREEN, "live".to_string()),
        ConnectionStatus::Reconnecting { attempt } => (
            egui::Color32::YELLOW,
            format!("reconnecting (attempt {attempt})"),
        ),
        ConnectionStatus::Offline => (egui::Color32::RED, "offline".to_string()),
    }
}
