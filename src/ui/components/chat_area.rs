use chrono::{DateTime, Utc};
use eframe::egui;

use crate::common::ChatMessage;

pub fn render(ui: &mut egui::Ui, messages: &[ChatMessage], now: DateTime<Utc>) {
    egui::ScrollArea::vertical()
        .stick_to_bottom(true)
        .auto_shrink([false, false])
        .show(ui, |ui| {
            if messages.is_empty() {
                ui.label(egui::RichText::new("No messages in the last 10 minutes").weak());
                return;
            }

            for message in messages {
                ui.horizontal_wrapped(|ui| {
                    let name = egui::RichText::new(message.sender_name()).strong();
                    if message.sender.is_none() {
                        ui.label(name.italics());
                    } else {
                        ui.label(name);
                    }
                    ui.label(&message.content);
                    if let Some(created_at) = message.created_at {
                        ui.label(egui::RichText::new(age_label(now, created_at)).weak().small());
                    }
                });
            }
        });
}

fn age_label(now: DateTime<Utc>, created_at: DateTime<Utc>) -> String {
    let seconds = (now - created_at).num_seconds().max(0);
    if seconds < 60 {
        "just now".to_string()
    } else {
        format!("{}m ago", seconds / 60)
    }
}
