use gtk4::prelude::*;
use libadwaita::prelude::*;

/// Handles returned from building the control panel window.
pub struct DashboardWidgets {
    pub window: libadwaita::ApplicationWindow,
    pub status_label: gtk4::Label,
    pub hotkey_label: gtk4::Label,
    pub change_hotkey_button: gtk4::Button,
    pub capture_row: libadwaita::ActionRow,
    pub progress_bar: gtk4::ProgressBar,
}

/// Build the control panel: the app's stand-in for a tray menu.
pub fn build_dashboard(
    app: &libadwaita::Application,
    initial_status: &str,
    initial_hotkey: &str,
) -> DashboardWidgets {
    let window = libadwaita::ApplicationWindow::builder()
        .application(app)
        .title("Screen OCR")
        .default_width(420)
        .default_height(360)
        .build();

    let toolbar_view = libadwaita::ToolbarView::new();
    let header = libadwaita::HeaderBar::new();

    let menu_button = gtk4::MenuButton::new();
    menu_button.set_icon_name("open-menu-symbolic");

    let menu = gtk4::gio::Menu::new();
    menu.append(Some("Capture Text"), Some("app.capture"));
    menu.append(Some("Hide Window"), Some("app.hide-window"));
    menu.append(Some("Quit"), Some("app.quit"));

    menu_button.set_menu_model(Some(&menu));
    header.pack_end(&menu_button);

    toolbar_view.add_top_bar(&header);

    let content = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    content.set_margin_start(16);
    content.set_margin_end(16);
    content.set_margin_top(12);
    content.set_margin_bottom(12);

    // --- Status group ---
    let status_group = libadwaita::PreferencesGroup::new();
    status_group.set_title("Status");

    let status_row = libadwaita::ActionRow::builder()
        .title("OCR Engine")
        .build();
    let status_label = gtk4::Label::new(Some(initial_status));
    status_label.add_css_class("dim-label");
    status_row.add_suffix(&status_label);
    status_group.add(&status_row);

    let capture_row = libadwaita::ActionRow::builder()
        .title("Capture Text")
        .subtitle("Drag over a screen region to recognize its text")
        .activatable(true)
        .build();
    let chevron = gtk4::Image::from_icon_name("go-next-symbolic");
    capture_row.add_suffix(&chevron);
    status_group.add(&capture_row);

    content.append(&status_group);
    content.append(&gtk4::Separator::new(gtk4::Orientation::Horizontal));

    // --- Hotkey group ---
    let hotkey_group = libadwaita::PreferencesGroup::new();
    hotkey_group.set_title("Hotkey");
    hotkey_group.set_margin_top(12);

    let hotkey_row = libadwaita::ActionRow::builder()
        .title("Capture")
        .build();
    let hotkey_label = gtk4::Label::new(Some(initial_hotkey));
    hotkey_label.add_css_class("dim-label");
    hotkey_row.add_suffix(&hotkey_label);

    let change_hotkey_button = gtk4::Button::builder()
        .label("Change")
        .valign(gtk4::Align::Center)
        .build();
    hotkey_row.add_suffix(&change_hotkey_button);
    hotkey_group.add(&hotkey_row);

    content.append(&hotkey_group);

    // --- Model download progress ---
    let progress_bar = gtk4::ProgressBar::new();
    progress_bar.set_margin_top(16);
    progress_bar.set_visible(false);
    progress_bar.set_show_text(true);
    progress_bar.set_text(Some("Downloading OCR model..."));
    content.append(&progress_bar);

    let scrolled = gtk4::ScrolledWindow::builder()
        .hscrollbar_policy(gtk4::PolicyType::Never)
        .child(&content)
        .build();
    toolbar_view.set_content(Some(&scrolled));
    window.set_content(Some(&toolbar_view));

    // Closing only hides; the app keeps listening for the hotkey.
    window.connect_close_request(|w| {
        w.set_visible(false);
        gtk4::glib::Propagation::Stop
    });

    DashboardWidgets {
        window,
        status_label,
        hotkey_label,
        change_hotkey_button,
        capture_row,
        progress_bar,
    }
}

/// Show model download progress; `total` of 0 means unknown size.
pub fn set_download_progress(dash: &DashboardWidgets, downloaded: u64, total: u64) {
    dash.progress_bar.set_visible(true);
    if total > 0 {
        dash.progress_bar
            .set_fraction(downloaded as f64 / total as f64);
        let mb_done = downloaded as f64 / 1_048_576.0;
        let mb_total = total as f64 / 1_048_576.0;
        dash.progress_bar.set_text(Some(&format!(
            "Downloading OCR model: {mb_done:.1} / {mb_total:.1} MB"
        )));
    } else {
        dash.progress_bar.pulse();
    }
}
