use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use calloop::{
    EventLoop, LoopSignal,
    ping::make_ping,
    signals::{Signal, Signals},
    timer::{TimeoutAction, Timer},
};
use calloop_wayland_source::WaylandSource;
use wayland_client::{
    Connection,
    globals::registry_queue_init,
    protocol::{wl_compositor, wl_seat, wl_shm},
};
use wayland_protocols_misc::zwp_virtual_keyboard_v1::client::zwp_virtual_keyboard_manager_v1;
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_shell_v1;
use wayland_protocols_wlr::virtual_pointer::v1::client::zwlr_virtual_pointer_manager_v1;

mod actions;
mod config;
mod controller;
mod dispatch;
mod grid;
mod input;
mod keys;
mod keysym;
mod sequencer;
mod sink;
mod state;
mod ui;

use actions::WaylandActions;
use config::Settings;
use controller::Controller;
use state::{KeyRepeatState, KeyboardState, WaylandState};
use ui::{Overlay, OverlaySource, TextRenderer};

/// Poll interval for client-side key repeat
const REPEAT_POLL: Duration = Duration::from_millis(5);

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = config::Config::load().settings();

    // Connect to Wayland display
    let conn = Connection::connect_to_env().context("cannot connect to Wayland display")?;
    log::info!("Connected to Wayland display");

    let (globals, mut event_queue) = registry_queue_init::<State>(&conn)?;
    let qh = event_queue.handle();

    let seat: wl_seat::WlSeat = globals
        .bind(&qh, 1..=9, ())
        .context("wl_seat not available")?;
    let compositor: wl_compositor::WlCompositor = globals
        .bind(&qh, 4..=6, ())
        .context("wl_compositor not available")?;
    let shm: wl_shm::WlShm = globals
        .bind(&qh, 1..=1, ())
        .context("wl_shm not available")?;
    let layer_shell: zwlr_layer_shell_v1::ZwlrLayerShellV1 = globals
        .bind(&qh, 1..=4, ())
        .context("zwlr_layer_shell_v1 not available - is this a wlroots compositor?")?;
    let pointer_manager: zwlr_virtual_pointer_manager_v1::ZwlrVirtualPointerManagerV1 = globals
        .bind(&qh, 1..=2, ())
        .context("zwlr_virtual_pointer_manager_v1 not available")?;
    let pointer = pointer_manager.create_virtual_pointer(Some(&seat), &qh, ());
    log::info!("Created zwlr_virtual_pointer_v1");

    // Copy needs a virtual keyboard; everything else works without it
    let virtual_keyboard = match globals
        .bind::<zwp_virtual_keyboard_manager_v1::ZwpVirtualKeyboardManagerV1, _, _>(&qh, 1..=1, ())
    {
        Ok(manager) => {
            log::info!("Created zwp_virtual_keyboard_v1");
            Some(manager.create_virtual_keyboard(&seat, &qh, ()))
        }
        Err(e) => {
            log::warn!("zwp_virtual_keyboard_manager_v1 not available: {} (copy disabled)", e);
            None
        }
    };

    let actions = Arc::new(WaylandActions::new(
        conn.clone(),
        pointer,
        virtual_keyboard,
        (0, 0),
    ));

    let renderer = TextRenderer::new();
    if renderer.is_none() {
        log::warn!("Font not available, grid labels disabled");
    }
    let overlay = Overlay::new(
        &compositor,
        &layer_shell,
        &shm,
        &qh,
        settings.grid,
        renderer,
    );

    let mut state = State {
        loop_signal: None,
        wayland: WaylandState::new(qh.clone(), seat),
        keyboard: KeyboardState::new(),
        repeat: KeyRepeatState::new(),
        overlay: Some(overlay),
        actions: actions.clone(),
        controller: None,
        toggle_flag: Arc::new(AtomicBool::new(false)),
        settings,
    };

    // The grid geometry needs the output size from the first configure
    while !state.overlay.as_ref().is_some_and(Overlay::is_configured) {
        event_queue.blocking_dispatch(&mut state)?;
        if state.overlay.as_ref().is_some_and(Overlay::is_closed) {
            anyhow::bail!("overlay surface closed before first configure");
        }
    }
    let rect = state
        .overlay
        .as_ref()
        .map(Overlay::screen_rect)
        .context("overlay missing")?;
    log::info!("Grid covers {}x{}", rect.width, rect.height);

    // Blocks SIGINT/SIGTERM in this thread; must precede the sequencer thread,
    // which inherits the mask
    let exit_signals = Signals::new(&[Signal::SIGINT, Signal::SIGTERM])?;

    let (overlay_source, overlay_handle) = OverlaySource::new()?;
    state.controller = Some(Controller::new(
        &state.settings,
        rect,
        actions.clone(),
        Arc::new(overlay_handle),
    )?);

    let mut event_loop: EventLoop<State> = EventLoop::try_new()?;
    state.loop_signal = Some(event_loop.get_signal());
    let handle = event_loop.handle();

    WaylandSource::new(conn, event_queue).insert(handle.clone())?;

    handle.insert_source(overlay_source, |request, _, state| {
        if let Some(ref mut overlay) = state.overlay {
            overlay.apply(request, &state.wayland.qh);
        }
    })?;

    // Set up signal handling for clean exit
    let loop_signal = state.loop_signal.clone();
    handle.insert_source(exit_signals, move |_, _, _| {
        log::info!("Received signal, exiting...");
        if let Some(ref signal) = loop_signal {
            signal.stop();
        }
    })?;

    // SIGUSR1 opens the grid (bind e.g. `pkill -USR1 gridclick` in the compositor).
    // The handler only sets a flag and wakes the loop; the reset runs after dispatch.
    let (ping, ping_source) = make_ping()?;
    let toggle_flag = state.toggle_flag.clone();
    unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGUSR1, move || {
            toggle_flag.store(true, Ordering::SeqCst);
            ping.ping();
        })?;
    }
    handle.insert_source(ping_source, |_, _, _| {})?;

    // The timer's InsertError is not Send, so only its cause is kept
    handle
        .insert_source(Timer::from_duration(REPEAT_POLL), |_, _, state| {
            state.fire_repeat(Instant::now());
            TimeoutAction::ToDuration(REPEAT_POLL)
        })
        .map_err(|e| anyhow::anyhow!("failed to insert repeat timer: {}", e.error))?;

    log::info!("Entering event loop... (send SIGUSR1 to open the grid)");

    event_loop.run(None, &mut state, |state| {
        let Some(ref mut controller) = state.controller else {
            return;
        };
        if state.toggle_flag.swap(false, Ordering::SeqCst) {
            controller.request_forced_reset();
        }
        if controller.has_deferred() {
            controller.run_deferred();
        }
    })?;

    // Cleanup: release any held drag before tearing down the devices
    if let Some(mut controller) = state.controller.take() {
        controller.shutdown();
    }
    if let Some(overlay) = state.overlay.take() {
        overlay.destroy();
    }
    actions.destroy();

    log::info!("Goodbye!");
    Ok(())
}

pub struct State {
    pub(crate) loop_signal: Option<LoopSignal>,
    pub(crate) wayland: WaylandState,
    pub(crate) keyboard: KeyboardState,
    pub(crate) repeat: KeyRepeatState,
    pub(crate) overlay: Option<Overlay>,
    pub(crate) actions: Arc<WaylandActions>,
    /// Created once the overlay knows the output size
    pub(crate) controller: Option<Controller>,
    /// Set by the SIGUSR1 handler
    pub(crate) toggle_flag: Arc<AtomicBool>,
    pub(crate) settings: Settings,
}
