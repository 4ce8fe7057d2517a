//! `cxx` bridge to the ADIOS2 C++ API (spec §9 "FFI to the ADIOS2 C++
//! library"). ADIOS2's own API is a C++ template library (`IO::DefineVariable<T>`,
//! `Engine::Put<T>`, ...); `cxx` cannot cross a template boundary, so the
//! C++-side shim (`shim.h`/`shim.cpp`) does the same closed-set runtime
//! dispatch over a datatype-name string that [`crate::with_datatype!`] does
//! on the Rust side, and every function below is a single, non-generic
//! entry point taking raw bytes plus a type tag rather than one entry point
//! per ADIOS2 template instantiation.
//!
//! A thin, mostly-mechanical boundary: one `adios2::IO`/`adios2::Engine`
//! pair per open file, and a type tag (matching `adios2::GetType<T>()`'s
//! string) threaded alongside every buffer that crosses it. The rest of the
//! adapter builds a safe API on top of this module.

#[cxx::bridge(namespace = "openpmd_io_core::adios2_shim")]
pub mod ffi {
    unsafe extern "C++" {
        include!("openpmd-io-core/src/backend/adios2/shim.h");

        type Adios2Adios;
        type Adios2Io;
        type Adios2Engine;

        /// One ADIOS2 top-level instance per process; owned by the adapter
        /// for its whole lifetime (spec §4.4 "coordinating ADIOS2 IO/Engine
        /// objects").
        fn new_adios() -> UniquePtr<Adios2Adios>;

        /// `adios2::ADIOS::DeclareIO`. The original gives each file's IO a
        /// counter-based name distinct from the filename to avoid
        /// collisions across delete-then-recreate cycles (spec §3 "File
        /// handle" lifetime); callers here pass that already-uniqued name.
        fn declare_io(adios: Pin<&mut Adios2Adios>, unique_io_name: &str) -> Result<UniquePtr<Adios2Io>>;

        fn io_set_engine(io: Pin<&mut Adios2Io>, engine_type: &str);
        fn io_set_parameter(io: Pin<&mut Adios2Io>, key: &str, value: &str);

        /// `adios2::IO::Open`. `mode` is one of `"write" | "append" |
        /// "read" | "readrandomaccess"`, resolved by `mod.rs` from spec
        /// §4.4.2 before crossing the bridge.
        fn io_open(io: Pin<&mut Adios2Io>, path: &str, mode: &str) -> Result<UniquePtr<Adios2Engine>>;

        /// `mode` is `"begin"` or `"end"`. Returns a status code: `0` =
        /// `adios2::StepStatus::OK`, `1` = `EndOfStream`, `2` = any other
        /// (`NotReady`/`OtherError`), spec §4.4.3.
        fn engine_begin_step(engine: Pin<&mut Adios2Engine>, timeout_seconds: f64) -> Result<i32>;
        fn engine_end_step(engine: Pin<&mut Adios2Engine>) -> Result<()>;
        fn engine_perform_puts(engine: Pin<&mut Adios2Engine>) -> Result<()>;
        fn engine_perform_gets(engine: Pin<&mut Adios2Engine>) -> Result<()>;
        /// BP5-only; the shim returns `Err` for engines that do not
        /// implement it so `mod.rs` can downgrade to `Buffer` (spec §4.4.5).
        fn engine_perform_data_write(engine: Pin<&mut Adios2Engine>) -> Result<()>;
        fn engine_current_step(engine: &Adios2Engine) -> u64;
        fn engine_close(engine: Pin<&mut Adios2Engine>) -> Result<()>;

        /// `adios2::IO::DefineVariable<T>`, selecting `T` at runtime from
        /// `dtype` (one of the strings in `datatype_name`, `mod.rs`).
        /// Idempotent: redefining an existing variable with the same shape
        /// is a no-op rather than an error, matching `createDataset`'s
        /// idempotence (spec §4.3).
        #[allow(clippy::too_many_arguments)]
        fn io_define_variable(
            io: Pin<&mut Adios2Io>,
            name: &str,
            dtype: &str,
            shape: &[u64],
            start: &[u64],
            count: &[u64],
            constant_dims: bool,
        ) -> Result<()>;
        /// `Variable<T>::SetShape`, used by `EXTEND_DATASET` (spec §4.3
        /// `extendDataset`).
        fn io_variable_set_shape(io: Pin<&mut Adios2Io>, name: &str, dtype: &str, shape: &[u64]) -> Result<()>;
        fn io_inquire_variable_shape(io: Pin<&mut Adios2Io>, name: &str) -> Result<Vec<u64>>;
        fn io_inquire_variable_type(io: Pin<&mut Adios2Io>, name: &str) -> Result<String>;
        /// `Variable<T>::AddOperation`, spec §4.3 "operator chain".
        fn io_add_operation(
            io: Pin<&mut Adios2Io>,
            name: &str,
            dtype: &str,
            operator_type: &str,
            keys: Vec<String>,
            values: Vec<String>,
        ) -> Result<()>;

        /// `Engine::Put<T>(variable, data, adios2::Mode::Sync)`.
        #[allow(clippy::too_many_arguments)]
        fn engine_put_sync(
            engine: Pin<&mut Adios2Engine>,
            io: Pin<&mut Adios2Io>,
            name: &str,
            dtype: &str,
            start: &[u64],
            count: &[u64],
            data: &[u8],
        ) -> Result<()>;
        /// `Engine::Put<T>(variable, data, adios2::Mode::Deferred)`. Per
        /// spec §5 "Backend-internal asynchrony", `data` must stay valid
        /// until the next `PerformPuts`/`EndStep`/`Close`; the Rust caller
        /// guarantees this via [`super::buffered_action`]'s queues.
        #[allow(clippy::too_many_arguments)]
        fn engine_put_deferred(
            engine: Pin<&mut Adios2Engine>,
            io: Pin<&mut Adios2Io>,
            name: &str,
            dtype: &str,
            start: &[u64],
            count: &[u64],
            data: &[u8],
        ) -> Result<()>;
        /// `Engine::Get<T>(variable, data, adios2::Mode::Deferred)`. `out`
        /// must stay valid until the next `PerformGets`/`EndStep`.
        #[allow(clippy::too_many_arguments)]
        fn engine_get_deferred(
            engine: Pin<&mut Adios2Engine>,
            io: Pin<&mut Adios2Io>,
            name: &str,
            dtype: &str,
            start: &[u64],
            count: &[u64],
            out: &mut [u8],
        ) -> Result<()>;

        /// `Engine::Put<T>(variable)` (the span-returning overload). Returns
        /// an opaque span id the shim keeps alive until the next
        /// `engine_reset_spans` call (spec §4.4.8).
        fn engine_get_span(
            engine: Pin<&mut Adios2Engine>,
            io: Pin<&mut Adios2Io>,
            name: &str,
            dtype: &str,
            start: &[u64],
            count: &[u64],
        ) -> Result<u64>;
        /// `adios2::detail::Span<T>::data()`, which may return a different
        /// address than the one handed out at `engine_get_span` time if the
        /// engine reallocated its internal buffer (spec §4.4.8, §8 property
        /// 6).
        fn span_base_pointer(engine: Pin<&mut Adios2Engine>, span_id: u64) -> Result<usize>;
        /// Drops every live span handle; called at every flush point (spec
        /// §5 "any flush invalidates all outstanding span base pointers").
        fn engine_reset_spans(engine: Pin<&mut Adios2Engine>);

        fn io_define_attribute_scalar(
            io: Pin<&mut Adios2Io>,
            name: &str,
            dtype: &str,
            bytes: &[u8],
            allow_modification: bool,
        ) -> Result<()>;
        fn io_define_attribute_array(
            io: Pin<&mut Adios2Io>,
            name: &str,
            dtype: &str,
            bytes: &[u8],
            allow_modification: bool,
        ) -> Result<()>;
        fn io_define_attribute_string(
            io: Pin<&mut Adios2Io>,
            name: &str,
            value: &str,
            allow_modification: bool,
        ) -> Result<()>;
        fn io_define_attribute_string_array(
            io: Pin<&mut Adios2Io>,
            name: &str,
            values: Vec<String>,
            allow_modification: bool,
        ) -> Result<()>;

        fn io_read_attribute_bytes(io: Pin<&mut Adios2Io>, name: &str) -> Result<Vec<u8>>;
        fn io_read_attribute_type(io: Pin<&mut Adios2Io>, name: &str) -> Result<String>;
        fn io_read_attribute_string(io: Pin<&mut Adios2Io>, name: &str) -> Result<String>;
        fn io_read_attribute_string_array(io: Pin<&mut Adios2Io>, name: &str) -> Result<Vec<String>>;
        fn io_remove_attribute(io: Pin<&mut Adios2Io>, name: &str) -> bool;

        /// `IO::AvailableVariables`/`AvailableAttributes`, names only; the
        /// adapter's own availability cache (`attributes.rs`) pairs each
        /// name back up with its datatype via `io_inquire_variable_type` /
        /// `io_read_attribute_type` on demand (spec §4.4.7).
        fn io_available_variables(io: Pin<&mut Adios2Io>) -> Vec<String>;
        fn io_available_attributes(io: Pin<&mut Adios2Io>) -> Vec<String>;

        /// `Engine::BlocksInfo<T>`/`AllStepsBlocksInfo<T>`, spec §6.1
        /// `availableChunks`. Blocks come back flattened: `out_starts` and
        /// `out_counts` each hold `rank` entries per block back to back,
        /// `out_writer_ids` one entry per block; the return value is `rank`,
        /// used by the caller to un-flatten. `all_steps` selects
        /// `AllStepsBlocksInfo` (file-based random-access reads) over
        /// `BlocksInfo` at the engine's current step.
        #[allow(clippy::too_many_arguments)]
        fn engine_available_chunks(
            engine: Pin<&mut Adios2Engine>,
            io: Pin<&mut Adios2Io>,
            name: &str,
            dtype: &str,
            all_steps: bool,
            out_starts: &mut Vec<u64>,
            out_counts: &mut Vec<u64>,
            out_writer_ids: &mut Vec<u32>,
        ) -> Result<u64>;
    }
}
