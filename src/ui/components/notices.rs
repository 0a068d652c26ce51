use eframe::egui;

use crate::common::Notice;

pub fn render(ui: &mut egui::Ui, notices: &[Notice]) {
    for notice in notices {
        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.colored_label(egui::Color32::LIGHT_RED, &notice.text);
        });
    }
}
