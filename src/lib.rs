#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod geom;

use std::fmt;

use geom::{
    ActiveStroke, InkGeometry, InkToolbox, RibbonMesh, Stroke, StrokeError, StrokePoint,
    StrokeRecord, ToolboxConfig, detect_shape_with_context, validate_points, vectorize_records,
    vectorize_with_context,
};
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            // no-op fallback when panic hook is disabled
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {
    // no-op fallback when debug logs are disabled
}

#[cfg(all(feature = "parallel", target_arch = "wasm32"))]
#[wasm_bindgen]
pub async fn initialize_parallel(worker_count: Option<u32>) -> Result<(), JsError> {
    let threads = worker_count
        .map(|count| count.max(1) as usize)
        .or_else(|| {
            std::thread::available_parallelism()
                .map(|value| value.get())
                .ok()
        })
        .unwrap_or(1);

    wasm_bindgen_rayon::init_thread_pool(threads)
        .await
        .map_err(|err| JsError::new(&format!("could not start rayon thread pool: {err}")))
}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                println!("{}", format!($($t)*));
            }
        }
    }};
}

/// Public entry point for the drawing surface.
///
/// Holds the tuned constants and the stroke currently under the pen. Every
/// other call is stateless.
#[wasm_bindgen]
pub struct InkEngine {
    toolbox: InkToolbox,
    active: Option<ActiveStroke>,
}

#[wasm_bindgen]
impl InkEngine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> InkEngine {
        InkEngine::with_toolbox(InkToolbox::new())
    }

    /// Builds an engine from a partial options object
    /// (`{ ribbon: {...}, recognition: {...} }`).
    #[wasm_bindgen(js_name = withOptions)]
    pub fn with_options(options: JsValue) -> Result<InkEngine, JsValue> {
        let config: ToolboxConfig = if options.is_undefined() || options.is_null() {
            ToolboxConfig::default()
        } else {
            serde_wasm_bindgen::from_value(options).map_err(to_js_error)?
        };
        Ok(InkEngine::with_toolbox(InkToolbox::from_config(config)))
    }

    /// Recognizes a finished stroke and returns the tagged geometry.
    #[wasm_bindgen]
    pub fn detect_shape(&mut self, points: JsValue) -> Result<JsValue, JsValue> {
        let points: Vec<StrokePoint> = serde_wasm_bindgen::from_value(points).map_err(to_js_error)?;
        let geometry = self.recognize(&points).map_err(to_js_error)?;
        serde_wasm_bindgen::to_value(&geometry).map_err(to_js_error)
    }

    /// Batch ribbon for a finished stroke as interleaved `x, y` positions.
    #[wasm_bindgen]
    pub fn vectorize(&mut self, points: JsValue, width: f64) -> Result<Vec<f64>, JsValue> {
        let points: Vec<StrokePoint> = serde_wasm_bindgen::from_value(points).map_err(to_js_error)?;
        let mesh = self.vectorize_stroke(&points, width).map_err(to_js_error)?;
        Ok(mesh.to_flat())
    }

    /// Starts a live stroke, discarding any unfinished one.
    #[wasm_bindgen]
    pub fn begin_stroke(&mut self, width: f64) {
        self.begin(width);
    }

    /// Returns `false` when the sample was merged into the previous one.
    #[wasm_bindgen]
    pub fn push_point(&mut self, x: f64, y: f64, pressure: f64, timestamp: f64) -> Result<bool, JsValue> {
        self.push_sample(StrokePoint::new(x, y, pressure, timestamp))
            .map_err(to_js_error)
    }

    /// Advances the pen simulation `steps` ticks and returns the live ribbon.
    #[wasm_bindgen]
    pub fn live_mesh(&mut self, steps: usize) -> Result<Vec<f64>, JsValue> {
        Ok(self.preview(steps).map_err(to_js_error)?.to_flat())
    }

    /// Ends the live stroke and returns its samples with the batch ribbon.
    #[wasm_bindgen]
    pub fn end_stroke(&mut self) -> Result<JsValue, JsValue> {
        let stroke = self.finish().map_err(to_js_error)?;
        serde_wasm_bindgen::to_value(&stroke).map_err(to_js_error)
    }

    /// Rebuilds ribbons for stored stroke records, each at its own width.
    #[wasm_bindgen]
    pub fn vectorize_records(&self, records: JsValue) -> Result<JsValue, JsValue> {
        let records: Vec<StrokeRecord> = serde_wasm_bindgen::from_value(records).map_err(to_js_error)?;
        let meshes = vectorize_records(&records, &self.toolbox.ribbon);
        serde_wasm_bindgen::to_value(&meshes).map_err(to_js_error)
    }
}

impl Default for InkEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}

impl InkEngine {
    #[must_use]
    pub fn with_toolbox(toolbox: InkToolbox) -> Self {
        Self {
            toolbox,
            active: None,
        }
    }

    #[must_use]
    pub fn toolbox(&self) -> &InkToolbox {
        &self.toolbox
    }

    pub fn toolbox_mut(&mut self) -> &mut InkToolbox {
        &mut self.toolbox
    }

    #[must_use]
    pub fn is_drawing(&self) -> bool {
        self.active.is_some()
    }

    pub fn recognize(&mut self, points: &[StrokePoint]) -> Result<InkGeometry, StrokeError> {
        validate_points(points)?;
        let (shape, diagnostics) = detect_shape_with_context(points, &mut self.toolbox);
        debug_log!("detect_shape: {:?} {:?}", shape.kind(), diagnostics);
        Ok(InkGeometry::from(shape))
    }

    pub fn vectorize_stroke(&mut self, points: &[StrokePoint], width: f64) -> Result<RibbonMesh, StrokeError> {
        validate_points(points)?;
        Ok(vectorize_with_context(points, width, &mut self.toolbox))
    }

    pub fn begin(&mut self, width: f64) {
        self.active = Some(ActiveStroke::new(self.toolbox.ribbon.width(width)));
    }

    pub fn push_sample(&mut self, sample: StrokePoint) -> Result<bool, StrokeError> {
        let active = self.active.as_mut().ok_or(StrokeError::NoActiveStroke)?;
        if !sample.is_finite() {
            return Err(StrokeError::NonFinite {
                index: active.points().len(),
            });
        }
        Ok(active.push(sample))
    }

    pub fn preview(&mut self, steps: usize) -> Result<RibbonMesh, StrokeError> {
        let active = self.active.as_mut().ok_or(StrokeError::NoActiveStroke)?;
        Ok(active.preview(steps))
    }

    pub fn finish(&mut self) -> Result<Stroke, StrokeError> {
        let active = self.active.take().ok_or(StrokeError::NoActiveStroke)?;
        if active.points().is_empty() {
            return Err(StrokeError::Empty);
        }
        Ok(active.finish())
    }
}
