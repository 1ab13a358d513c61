pub mod menu;
pub mod panel;

use std::io::Write;

pub use menu::{MenuLists, MenuModel};
pub use panel::PanelLabel;

/// Receives every UI update the orchestrator produces
pub trait UiSink: Send {
    fn update_menu(&mut self, menu: &MenuModel);
    fn update_panel_label(&mut self, label: &PanelLabel);
    fn update_lists(&mut self, lists: &MenuLists);
}

/// Headless sink: prints the panel label whenever it changes and logs the rest
#[derive(Debug, Default)]
pub struct ConsoleSink {
    last_label: Option<PanelLabel>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UiSink for ConsoleSink {
    fn update_menu(&mut self, menu: &MenuModel) {
        tracing::debug!("Menu: {} ({:?})", menu.header, menu.actions);
        if let Some(notice) = &menu.update_notice {
            tracing::debug!("Update notice: {}", notice);
        }
    }

    fn update_panel_label(&mut self, label: &PanelLabel) {
        if self.last_label.as_ref() == Some(label) {
            return;
        }

        let line = match &label.detail {
            Some(detail) => format!("{} | {}", label.text, detail),
            None => label.text.clone(),
        };
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", line).and_then(|_| stdout.flush()) {
            tracing::warn!("Could not write panel label: {}", e);
        }
        self.last_label = Some(label.clone());
    }

    fn update_lists(&mut self, lists: &MenuLists) {
        tracing::info!(
            "Lists rebuilt: {} countries, cities for {}, servers for {}",
            lists.countries.len(),
            lists.cities.len(),
            lists.servers.len()
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Sink that keeps everything it is given, shared with the test body
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSink {
        pub menus: Arc<Mutex<Vec<MenuModel>>>,
        pub labels: Arc<Mutex<Vec<PanelLabel>>>,
        pub lists: Arc<Mutex<Vec<MenuLists>>>,
    }

    impl UiSink for RecordingSink {
        fn update_menu(&mut self, menu: &MenuModel) {
            self.menus.lock().unwrap().push(menu.clone());
        }

        fn update_panel_label(&mut self, label: &PanelLabel) {
            self.labels.lock().unwrap().push(label.clone());
        }

        fn update_lists(&mut self, lists: &MenuLists) {
            self.lists.lock().unwrap().push(lists.clone());
        }
    }
}
