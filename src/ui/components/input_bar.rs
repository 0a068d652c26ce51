use eframe::egui;

/// Returns true when the user asked to send the current input.
pub fn render(ui: &mut egui::Ui, input_text: &mut String, signed_in: bool) -> bool {
    let mut send = false;
    ui.horizontal(|ui| {
        let hint = if signed_in {
            "Type a message..."
        } else {
            "Log in to chat"
        };
        let response = ui.add(egui::TextEdit::singleline(input_text).hint_text(hint));
        if ui.button("Send").clicked() {
            send = true;
        }

        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            send = true;
            response.request_focus();
        }
    });
    send
}
