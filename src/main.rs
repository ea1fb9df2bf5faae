//! Pocket Arcade entry point
//!
//! In the browser the host picks a game from `?game=`, wires DOM input and
//! the native app bridge, and replays display lists on a 2D canvas. The
//! native build runs a short headless session of every game.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::f64::consts::TAU;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use web_sys::{
        CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlImageElement, KeyboardEvent,
        MessageEvent, PointerEvent,
    };

    use pocket_arcade::falling::{FallingGame, Variant};
    use pocket_arcade::geometry::{Rect, Viewport};
    use pocket_arcade::phase::GamePhase;
    use pocket_arcade::render::{AssetState, DrawCmd, Sprite, css, falling_scene, runner_scene};
    use pocket_arcade::runner::{RunnerEvent, RunnerGame};
    use pocket_arcade::services::bridge::{DetectionInput, detect_native_app};
    use pocket_arcade::services::identity::LocalStore;
    use pocket_arcade::services::leaderboard::table_for_flavor;
    use pocket_arcade::services::telemetry::LogSink;
    use pocket_arcade::services::{
        Analytics, AnalyticsEvent, DailyLeaderboard, Identity, NativeAppInfo, NativeBridge,
        NativeMessage, Platform, QueryParams, Services, TelemetryClient,
    };
    use pocket_arcade::{ArcadeError, ArcadeSettings, HostAction, Minigame, Notice};

    // Native app interfaces injected into the webview, plus gtag
    #[wasm_bindgen(inline_js = "
        export function has_android_interface() {
            return !!(window.Android && window.Android.receiveMessage);
        }

        export function has_ios_handler() {
            return !!(window.webkit && window.webkit.messageHandlers && window.webkit.messageHandlers.nativeApp);
        }

        export function post_to_android(json) {
            window.Android.receiveMessage(json);
        }

        export function post_to_ios(json) {
            window.webkit.messageHandlers.nativeApp.postMessage(JSON.parse(json));
        }

        export function gtag_event(name, params) {
            if (typeof window.gtag === 'function') {
                window.gtag('event', name, JSON.parse(params));
            }
        }
    ")]
    extern "C" {
        fn has_android_interface() -> bool;
        fn has_ios_handler() -> bool;
        #[wasm_bindgen(catch)]
        fn post_to_android(json: &str) -> Result<(), JsValue>;
        #[wasm_bindgen(catch)]
        fn post_to_ios(json: &str) -> Result<(), JsValue>;
        fn gtag_event(name: &str, params: &str);
    }

    /// Outbound messages through whichever interface the webview injected
    struct WebViewBridge {
        info: NativeAppInfo,
    }

    impl NativeBridge for WebViewBridge {
        fn info(&self) -> NativeAppInfo {
            self.info
        }

        fn send(&mut self, message: &NativeMessage) -> pocket_arcade::Result<()> {
            if !self.info.is_native {
                log::debug!("Not in the native app, dropping {:?}", message.kind);
                return Ok(());
            }
            let json = message.to_json()?;
            let posted = match self.info.platform {
                Platform::Android if has_android_interface() => post_to_android(&json),
                Platform::Ios if has_ios_handler() => post_to_ios(&json),
                platform => {
                    log::warn!("{:?} interface not available for {:?}", platform, message.kind);
                    return Ok(());
                }
            };
            posted.map_err(|e| ArcadeError::Bridge(format!("{:?}", e)))
        }
    }

    struct GtagAnalytics;

    impl Analytics for GtagAnalytics {
        fn track(&mut self, event: AnalyticsEvent) {
            gtag_event(event.name(), &event.params().to_string());
        }
    }

    enum ActiveGame {
        Runner(RunnerGame),
        Falling(FallingGame),
    }

    impl ActiveGame {
        fn minigame(&mut self) -> &mut dyn Minigame {
            match self {
                ActiveGame::Runner(g) => g,
                ActiveGame::Falling(g) => g,
            }
        }

        fn phase(&self) -> GamePhase {
            match self {
                ActiveGame::Runner(g) => g.phase(),
                ActiveGame::Falling(g) => g.phase(),
            }
        }
    }

    fn image_ready(img: &HtmlImageElement) -> bool {
        img.complete() && img.natural_width() > 0
    }

    /// Runner artwork; the scene falls back to flat shapes until decoded
    struct Sprites {
        player: HtmlImageElement,
        obstacle: HtmlImageElement,
        background: HtmlImageElement,
    }

    impl Sprites {
        fn load() -> Option<Self> {
            let image = |src: &str| -> Option<HtmlImageElement> {
                let img = HtmlImageElement::new().ok()?;
                img.set_src(src);
                Some(img)
            };
            Some(Self {
                player: image("assets/player.png")?,
                obstacle: image("assets/obstacle.png")?,
                background: image("assets/background.png")?,
            })
        }

        fn get(&self, sprite: Sprite) -> &HtmlImageElement {
            match sprite {
                Sprite::Player => &self.player,
                Sprite::Obstacle => &self.obstacle,
                Sprite::Background => &self.background,
            }
        }

        fn state(&self) -> AssetState {
            AssetState {
                player: image_ready(&self.player),
                obstacle: image_ready(&self.obstacle),
                background: image_ready(&self.background),
            }
        }
    }

    /// Game instance holding all host state
    struct Game {
        active: ActiveGame,
        canvas: HtmlCanvasElement,
        ctx: CanvasRenderingContext2d,
        dpr: f64,
        sprites: Option<Sprites>,
        background_sized: bool,
        last_time: f64,
    }

    impl Game {
        fn update(&mut self, elapsed_ms: f64) {
            self.active.minigame().frame(elapsed_ms);

            if let ActiveGame::Runner(runner) = &mut self.active {
                if !self.background_sized {
                    if let Some(bg) = self.sprites.as_ref().map(|s| &s.background) {
                        if image_ready(bg) {
                            runner.set_background_size(bg.natural_width() as f32, bg.natural_height() as f32);
                            self.background_sized = true;
                        }
                    }
                }
                for event in runner.take_events() {
                    match event {
                        RunnerEvent::StageUp { stage } => log::info!("Stage {}", stage),
                        RunnerEvent::Crashed { score } => log::info!("Crashed with {} points", score),
                        _ => {}
                    }
                }
            }

            let actions = self.active.minigame().take_actions();
            for action in actions {
                perform(action);
            }
        }

        fn render(&self) {
            let assets = self.sprites.as_ref().map(Sprites::state).unwrap_or_default();
            let cmds = match &self.active {
                ActiveGame::Runner(g) => runner_scene(&g.snapshot(), &assets),
                ActiveGame::Falling(g) => falling_scene(&g.snapshot()),
            };

            let ctx = &self.ctx;
            let _ = ctx.set_transform(self.dpr, 0.0, 0.0, self.dpr, 0.0, 0.0);
            ctx.clear_rect(
                0.0,
                0.0,
                f64::from(self.canvas.client_width()),
                f64::from(self.canvas.client_height()),
            );
            for cmd in &cmds {
                if let Err(e) = draw(ctx, cmd, self.sprites.as_ref()) {
                    log::error!("Draw failed: {:?}", e);
                    break;
                }
            }
        }

        fn update_hud(&self) {
            let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                return;
            };
            let phase = self.active.phase();
            let score = match &self.active {
                ActiveGame::Runner(g) => g.score(),
                ActiveGame::Falling(g) => g.score(),
            };

            set_text(&document, "score", &score.to_string());
            if let ActiveGame::Falling(g) = &self.active {
                set_text(&document, "time-left", &g.time_left().to_string());
            }

            if let Some(btn) = document.get_element_by_id("start-btn") {
                if phase.start_button_enabled() {
                    let _ = btn.remove_attribute("disabled");
                } else {
                    let _ = btn.set_attribute("disabled", "");
                }
                let label = if phase.is_processing_start() { "Processing..." } else { "Start" };
                btn.set_text_content(Some(label));
            }

            set_visible(&document, "start-screen", !phase.is_started());
            set_visible(&document, "native-required", phase.show_native_message());
            set_visible(&document, "game-over", phase.is_over());
            if phase.is_over() {
                set_text(&document, "final-score", &score.to_string());
            }
        }

        /// Match the canvas backing store to its CSS size
        fn fit_canvas(&mut self) {
            let Some(window) = web_sys::window() else {
                return;
            };
            self.dpr = window.device_pixel_ratio();
            let client_w = self.canvas.client_width();
            let client_h = self.canvas.client_height();
            self.canvas.set_width((f64::from(client_w) * self.dpr) as u32);
            self.canvas.set_height((f64::from(client_h) * self.dpr) as u32);
            self.active.minigame().resize(client_w as f32, client_h as f32);
            self.background_sized = false;
        }
    }

    fn set_text(document: &Document, id: &str, text: &str) {
        if let Some(el) = document.get_element_by_id(id) {
            el.set_text_content(Some(text));
        }
    }

    fn set_visible(document: &Document, id: &str, visible: bool) {
        if let Some(el) = document.get_element_by_id(id) {
            let _ = el.set_attribute("class", if visible { "" } else { "hidden" });
        }
    }

    fn perform(action: HostAction) {
        let Some(window) = web_sys::window() else {
            return;
        };
        match action {
            HostAction::Navigate(path) => {
                log::info!("Navigating to {}", path);
                if let Err(e) = window.location().set_href(&path) {
                    log::error!("Navigation failed: {:?}", e);
                }
            }
            HostAction::Notify(Notice { title, description }) => {
                log::warn!("{}: {}", title, description);
                if let Some(document) = window.document() {
                    set_text(&document, "toast-title", &title);
                    set_text(&document, "toast-description", &description);
                    set_visible(&document, "toast", true);
                }
            }
        }
    }

    fn rounded_path(ctx: &CanvasRenderingContext2d, rect: &Rect, radius: f32) -> Result<(), JsValue> {
        let (x, y, w, h) = (f64::from(rect.x), f64::from(rect.y), f64::from(rect.w), f64::from(rect.h));
        let r = f64::from(radius).min(w / 2.0).min(h / 2.0);
        ctx.begin_path();
        ctx.move_to(x + r, y);
        ctx.arc_to(x + w, y, x + w, y + h, r)?;
        ctx.arc_to(x + w, y + h, x, y + h, r)?;
        ctx.arc_to(x, y + h, x, y, r)?;
        ctx.arc_to(x, y, x + w, y, r)?;
        ctx.close_path();
        Ok(())
    }

    fn draw(ctx: &CanvasRenderingContext2d, cmd: &DrawCmd, sprites: Option<&Sprites>) -> Result<(), JsValue> {
        match cmd {
            DrawCmd::FillRect { rect, color } => {
                ctx.set_fill_style_str(&css(*color));
                ctx.fill_rect(f64::from(rect.x), f64::from(rect.y), f64::from(rect.w), f64::from(rect.h));
            }
            DrawCmd::RoundRect { rect, radius, color } => {
                rounded_path(ctx, rect, *radius)?;
                ctx.set_fill_style_str(&css(*color));
                ctx.fill();
            }
            DrawCmd::Image { sprite, rect, alpha } => {
                let Some(img) = sprites.map(|s| s.get(*sprite)) else {
                    return Ok(());
                };
                ctx.set_global_alpha(f64::from(*alpha));
                ctx.draw_image_with_html_image_element_and_dw_and_dh(
                    img,
                    f64::from(rect.x),
                    f64::from(rect.y),
                    f64::from(rect.w),
                    f64::from(rect.h),
                )?;
                ctx.set_global_alpha(1.0);
            }
            DrawCmd::Circle { center, radius, color } => {
                ctx.begin_path();
                ctx.arc(f64::from(center.x), f64::from(center.y), f64::from(*radius), 0.0, TAU)?;
                ctx.set_fill_style_str(&css(*color));
                ctx.fill();
            }
            DrawCmd::Text {
                text,
                pos,
                size_px,
                color,
                rotation,
                glow,
            } => {
                ctx.save();
                ctx.translate(f64::from(pos.x), f64::from(pos.y))?;
                ctx.rotate(f64::from(*rotation))?;
                ctx.set_font(&format!("900 {}px system-ui, sans-serif", size_px.round()));
                ctx.set_text_align("center");
                ctx.set_text_baseline("middle");
                if let Some(glow) = glow {
                    ctx.set_shadow_color(&css(*glow));
                    ctx.set_shadow_blur(18.0);
                }
                ctx.set_fill_style_str(&css(*color));
                ctx.fill_text(text, 0.0, 0.0)?;
                ctx.restore();
            }
        }
        Ok(())
    }

    /// Collaborators for this page load
    fn build_services(params: &QueryParams, seed: u64) -> Services {
        let window = web_sys::window().expect("no window");
        let location = window.location();
        let hostname = location.hostname().unwrap_or_default();
        let user_agent = window.navigator().user_agent().unwrap_or_default();

        let info = detect_native_app(&DetectionInput {
            user_agent: &user_agent,
            hostname: &hostname,
            has_android_interface: has_android_interface(),
            has_ios_handler: has_ios_handler(),
        });
        log::info!("Native app detection: {:?}", info);

        let identity = Identity::resolve(params, &mut LocalStore);
        let settings = ArcadeSettings::load(&LocalStore);
        let leaderboard = DailyLeaderboard::new(table_for_flavor(&identity.flavor)).with_store(LocalStore);
        log::info!("Playing as {} ({})", identity.nickname, identity.flavor.as_str());

        Services {
            leaderboard: Box::new(leaderboard),
            bridge: Box::new(WebViewBridge { info }),
            analytics: Box::new(GtagAnalytics),
            telemetry: TelemetryClient::new(LogSink, settings.enable_error_logging, seed),
            identity,
            settings,
        }
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Pocket Arcade starting...");

        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");

        // Hide loading indicator
        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let canvas: HtmlCanvasElement = document
            .get_element_by_id("canvas")
            .expect("no canvas")
            .dyn_into()
            .expect("not a canvas");
        let ctx: CanvasRenderingContext2d = canvas
            .get_context("2d")
            .ok()
            .flatten()
            .expect("no 2d context")
            .dyn_into()
            .expect("not a 2d context");

        let params = QueryParams::parse(&window.location().search().unwrap_or_default());
        let seed = js_sys::Date::now() as u64;
        let services = build_services(&params, seed);
        let viewport = Viewport::new(canvas.client_width() as f32, canvas.client_height() as f32);

        let (active, sprites) = match params.get("game").and_then(Variant::parse) {
            Some(variant) => {
                let game = variant.build(seed, services).expect("built-in game config is valid");
                log::info!("Loaded {}", game.config().title);
                (ActiveGame::Falling(game), None)
            }
            None => (ActiveGame::Runner(RunnerGame::new(seed, viewport, services)), Sprites::load()),
        };

        let game = Rc::new(RefCell::new(Game {
            active,
            canvas: canvas.clone(),
            ctx,
            dpr: 1.0,
            sprites,
            background_sized: false,
            last_time: 0.0,
        }));
        game.borrow_mut().fit_canvas();

        log::info!("Game initialized with seed: {}", seed);

        setup_input_handlers(&canvas, game.clone());
        setup_native_listener(game.clone());
        setup_buttons(game.clone());
        setup_resize(game.clone());

        if let Some(hud) = document.get_element_by_id("hud") {
            let _ = hud.set_attribute("class", "");
        }

        request_animation_frame(game);

        log::info!("Pocket Arcade running!");
    }

    fn setup_input_handlers(canvas: &HtmlCanvasElement, game: Rc<RefCell<Game>>) {
        // Tap / click
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: PointerEvent| {
                event.prevent_default();
                game.borrow_mut()
                    .active
                    .minigame()
                    .pointer(event.offset_x() as f32, event.offset_y() as f32);
            });
            let _ = canvas
                .add_event_listener_with_callback("pointerdown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Keyboard jump
        {
            let window = web_sys::window().unwrap();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                if let ActiveGame::Runner(runner) = &mut game.borrow_mut().active {
                    if matches!(event.key().as_str(), " " | "ArrowUp" | "w" | "W") {
                        event.prevent_default();
                        runner.jump();
                    }
                }
            });
            let _ = window
                .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    /// `message` events from the native app, either JSON text or an object
    fn setup_native_listener(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().unwrap();
        let closure = Closure::<dyn FnMut(_)>::new(move |event: MessageEvent| {
            let data = event.data();
            let text = data
                .as_string()
                .or_else(|| js_sys::JSON::stringify(&data).ok().and_then(|s| s.as_string()));
            let Some(text) = text else {
                return;
            };
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(payload) => game.borrow_mut().active.minigame().on_native_message(&payload),
                Err(e) => log::error!("Error parsing native message: {}", e),
            }
        });
        let _ = window.add_event_listener_with_callback("message", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_buttons(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().unwrap();
        let document = window.document().unwrap();

        let bind = |id: &str, action: fn(&mut dyn Minigame)| {
            if let Some(btn) = document.get_element_by_id(id) {
                let game = game.clone();
                let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                    action(game.borrow_mut().active.minigame());
                });
                let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
                closure.forget();
            }
        };

        bind("start-btn", |g| g.start());
        bind("restart-btn", |g| g.reset());
        bind("back-btn", |g| g.back_button());

        if let Some(btn) = document.get_element_by_id("toast-close") {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                if let Some(document) = web_sys::window().and_then(|w| w.document()) {
                    set_visible(&document, "toast", false);
                }
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_resize(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().unwrap();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            game.borrow_mut().fit_canvas();
        });
        let _ = window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().unwrap();
        let closure = Closure::once(move |time: f64| {
            game_loop(game, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(game: Rc<RefCell<Game>>, time: f64) {
        {
            let mut g = game.borrow_mut();

            let elapsed_ms = if g.last_time > 0.0 {
                (time - g.last_time).max(0.0)
            } else {
                0.0
            };
            g.last_time = time;

            g.update(elapsed_ms);
            g.render();
            g.update_hud();
        }

        request_animation_frame(game);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::run();
}

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use pocket_arcade::falling::Variant;
    use pocket_arcade::geometry::Viewport;
    use pocket_arcade::runner::RunnerGame;
    use pocket_arcade::services::Services;
    use pocket_arcade::{HostAction, Minigame};

    const FRAME_MS: f64 = 1000.0 / 60.0;
    /// Give up after two minutes of simulated play
    const MAX_FRAMES: u32 = 60 * 120;

    /// Jump on a fixed rhythm until the runner crashes
    pub fn runner(seed: u64) {
        let mut game = RunnerGame::new(seed, Viewport::default(), Services::offline(seed));
        game.start();

        let mut frames = 0;
        while !game.phase().is_over() && frames < MAX_FRAMES {
            if frames % 45 == 0 {
                game.jump();
            }
            game.frame(FRAME_MS);
            frames += 1;
        }

        println!(
            "Runner: {} points, stage {}, {:.1}s",
            game.score(),
            game.state().stage,
            f64::from(frames) * FRAME_MS / 1000.0
        );
    }

    /// Tap every correct item as soon as it is on screen
    pub fn falling(variant: Variant, seed: u64) -> pocket_arcade::Result<()> {
        let mut game = variant.build(seed, Services::offline(seed))?;
        game.resize(390.0, 600.0);
        game.start();

        let mut actions = Vec::new();
        let mut frames = 0;
        while actions.is_empty() && frames < MAX_FRAMES {
            let target = game
                .items()
                .iter()
                .find(|item| item.is_correct && item.y >= 0.0)
                .map(|item| item.id);
            if let Some(id) = target {
                game.tap(id);
            }
            game.frame(FRAME_MS);
            actions.extend(game.take_actions());
            frames += 1;
        }

        println!("{}: {} points", game.config().title, game.score());
        for action in actions {
            match action {
                HostAction::Navigate(path) => println!("  -> {}", path),
                HostAction::Notify(notice) => println!("  ! {}", notice.title),
            }
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Pocket Arcade (native) starting...");
    log::info!("The canvas host needs a browser - build for wasm32 for the web version");

    let seed = pocket_arcade::now_ms() as u64;
    headless::runner(seed);
    for variant in [
        pocket_arcade::falling::Variant::Symbol,
        pocket_arcade::falling::Variant::Idol,
        pocket_arcade::falling::Variant::Soccer,
    ] {
        if let Err(e) = headless::falling(variant, seed) {
            log::error!("{:?} failed: {}", variant, e);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}
