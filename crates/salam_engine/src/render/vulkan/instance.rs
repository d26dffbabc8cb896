//! Vulkan instance creation
//!
//! [`DriverInstanceFactory`] negotiates instance extensions and layers with the
//! loaded driver, creates the instance and optionally attaches a debug
//! messenger that forwards driver diagnostics to the log.

use super::error::{VulkanError, VulkanResult};
use crate::core::config::ApplicationConfig;
use crate::platform::{DriverLibrary, PlatformKind};
use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry, Instance};
use std::ffi::{c_char, CStr, CString};

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";
const ENGINE_NAME: &str = "Salam";

/// Application metadata handed to the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDescriptor {
    /// Application name
    pub name: String,
    /// Application version (major, minor, patch)
    pub version: (u32, u32, u32),
    /// Requested API version (major, minor)
    pub api_version: (u32, u32),
}

impl ApplicationDescriptor {
    /// Packed Vulkan API version
    pub const fn vk_api_version(&self) -> u32 {
        vk::make_api_version(0, self.api_version.0, self.api_version.1, 0)
    }

    /// Packed application version
    pub const fn vk_application_version(&self) -> u32 {
        vk::make_api_version(0, self.version.0, self.version.1, self.version.2)
    }
}

impl From<&ApplicationConfig> for ApplicationDescriptor {
    fn from(config: &ApplicationConfig) -> Self {
        Self {
            name: config.name.clone(),
            version: config.version,
            api_version: config.api_version,
        }
    }
}

/// Severity of a driver diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticSeverity {
    /// Diagnostic-only chatter
    Verbose,
    /// Informational message
    Info,
    /// Likely misuse or suboptimal behaviour
    Warning,
    /// Invalid usage
    Error,
}

impl DiagnosticSeverity {
    /// Classify the most severe bit of `flags`
    pub fn from_flags(flags: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            Self::Error
        } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            Self::Warning
        } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            Self::Info
        } else {
            Self::Verbose
        }
    }

    /// Log level the message is emitted at
    pub const fn log_level(self) -> log::Level {
        match self {
            Self::Error => log::Level::Error,
            Self::Warning => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Verbose => log::Level::Trace,
        }
    }
}

/// Category of a driver diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCategory {
    /// Neither validation nor performance related
    General,
    /// Invalid API usage
    Validation,
    /// Potentially non-optimal use
    Performance,
}

impl DiagnosticCategory {
    /// Classify `flags`, preferring the most specific category
    pub fn from_flags(flags: vk::DebugUtilsMessageTypeFlagsEXT) -> Self {
        if flags.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
            Self::Validation
        } else if flags.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
            Self::Performance
        } else {
            Self::General
        }
    }
}

/// One message reported by the driver's debug messenger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMessage {
    /// Severity
    pub severity: DiagnosticSeverity,
    /// Category tag
    pub category: DiagnosticCategory,
    /// Message identifier name (e.g. a validation VUID), or its number
    pub identifier: String,
    /// Free-text message body
    pub body: String,
}

impl DiagnosticMessage {
    /// Emit the message through the `log` facade
    pub fn log(&self) {
        log::log!(
            target: "salam::driver",
            self.severity.log_level(),
            "[{:?}] [{:?}] {}: {}",
            self.severity,
            self.category,
            self.identifier,
            self.body
        );
    }
}

unsafe extern "system" fn diagnostic_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() {
        return vk::FALSE;
    }
    let data = &*callback_data;

    let identifier = if data.p_message_id_name.is_null() {
        data.message_id_number.to_string()
    } else {
        CStr::from_ptr(data.p_message_id_name).to_string_lossy().into_owned()
    };
    let body = if data.p_message.is_null() {
        String::new()
    } else {
        CStr::from_ptr(data.p_message).to_string_lossy().into_owned()
    };

    DiagnosticMessage {
        severity: DiagnosticSeverity::from_flags(message_severity),
        category: DiagnosticCategory::from_flags(message_type),
        identifier,
        body,
    }
    .log();

    vk::FALSE
}

fn messenger_create_info<'a>() -> vk::DebugUtilsMessengerCreateInfoEXTBuilder<'a> {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(diagnostic_callback))
}

pub(crate) fn c_name(raw: &[c_char]) -> String {
    // SAFETY: the driver fills name arrays with NUL-terminated strings.
    unsafe { CStr::from_ptr(raw.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

fn to_cstrings(names: &[String]) -> VulkanResult<Vec<CString>> {
    names
        .iter()
        .map(|name| CString::new(name.as_str()).map_err(|_| VulkanError::ExtensionNameInvalid(name.clone())))
        .collect()
}

/// Decide which extensions to enable
///
/// Every required extension must be available. Optional ones are kept only
/// when available. The result is free of duplicates and keeps first-seen order.
pub fn negotiate_extensions(
    required: &[String],
    optional: &[String],
    available: &[String],
) -> VulkanResult<Vec<String>> {
    let missing: Vec<&str> = required
        .iter()
        .filter(|name| !available.contains(name))
        .map(String::as_str)
        .collect();

    if !missing.is_empty() {
        return Err(VulkanError::InitializationFailed(format!(
            "Required instance extensions not supported: {}",
            missing.join(", ")
        )));
    }

    let mut enabled: Vec<String> = Vec::with_capacity(required.len() + optional.len());
    for name in required
        .iter()
        .chain(optional.iter().filter(|name| available.contains(name)))
    {
        if !enabled.contains(name) {
            enabled.push(name.clone());
        }
    }

    Ok(enabled)
}

/// Builder for [`DriverInstance`]
pub struct DriverInstanceFactory<'a> {
    library: &'a DriverLibrary,
    required_extensions: Vec<String>,
    optional_extensions: Vec<String>,
    diagnostics: bool,
    platform: PlatformKind,
}

impl<'a> DriverInstanceFactory<'a> {
    /// Start a factory for instances created through `library`
    pub fn new(library: &'a DriverLibrary) -> Self {
        Self {
            library,
            required_extensions: Vec::new(),
            optional_extensions: Vec::new(),
            diagnostics: false,
            platform: PlatformKind::current(),
        }
    }

    /// Extensions the instance can't work without
    #[must_use]
    pub fn required_extensions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_extensions.extend(names.into_iter().map(Into::into));
        self
    }

    /// Extensions enabled only when the driver offers them
    #[must_use]
    pub fn optional_extensions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_extensions.extend(names.into_iter().map(Into::into));
        self
    }

    /// Attach the validation layer and a diagnostic message sink
    #[must_use]
    pub const fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    /// Override the platform used for the portability decision
    #[must_use]
    pub const fn with_platform(mut self, platform: PlatformKind) -> Self {
        self.platform = platform;
        self
    }

    /// Create the instance
    pub fn build(self, application: &ApplicationDescriptor) -> VulkanResult<DriverInstance> {
        let entry = self.library.entry();

        let layers = entry.enumerate_instance_layer_properties()?;
        let layer_names: Vec<String> = layers.iter().map(|layer| c_name(&layer.layer_name)).collect();
        for name in &layer_names {
            log::info!("Instance layer: {name}");
        }

        let available: Vec<String> = entry
            .enumerate_instance_extension_properties(None)?
            .iter()
            .map(|ext| c_name(&ext.extension_name))
            .collect();

        let portability_name = vk::KhrPortabilityEnumerationFn::name()
            .to_string_lossy()
            .into_owned();
        let debug_utils_name = DebugUtils::name().to_string_lossy().into_owned();

        let mut optional = self.optional_extensions;
        if self.platform.needs_portability_enumeration() {
            optional.push(portability_name.clone());
        }

        let diagnostics = self.diagnostics && available.contains(&debug_utils_name);
        if self.diagnostics && !diagnostics {
            log::warn!("{debug_utils_name} unavailable, driver diagnostics disabled");
        }
        if diagnostics {
            optional.push(debug_utils_name.clone());
        }

        let extensions = negotiate_extensions(&self.required_extensions, &optional, &available)?;
        for name in &extensions {
            log::debug!("Enabling instance extension: {name}");
        }

        let enabled_layers: Vec<String> = if diagnostics && layer_names.iter().any(|l| l == VALIDATION_LAYER) {
            vec![VALIDATION_LAYER.to_string()]
        } else {
            if diagnostics {
                log::warn!("{VALIDATION_LAYER} not installed, continuing without validation");
            }
            Vec::new()
        };

        let mut flags = vk::InstanceCreateFlags::empty();
        if extensions.contains(&portability_name) {
            flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
        }

        let app_name = CString::new(application.name.as_str())
            .map_err(|_| VulkanError::InitializationFailed("Application name contains NUL".to_string()))?;
        let engine_name = CString::new(ENGINE_NAME)
            .map_err(|_| VulkanError::InitializationFailed("Engine name contains NUL".to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(application.vk_application_version())
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(application.vk_api_version());

        let extension_cstrings = to_cstrings(&extensions)?;
        let extension_ptrs: Vec<*const c_char> = extension_cstrings.iter().map(|ext| ext.as_ptr()).collect();
        let layer_cstrings = to_cstrings(&enabled_layers)?;
        let layer_ptrs: Vec<*const c_char> = layer_cstrings.iter().map(|layer| layer.as_ptr()).collect();

        // Chained so instance creation and destruction are covered too
        let mut instance_messenger_info = messenger_create_info();
        let mut create_info = vk::InstanceCreateInfo::builder()
            .flags(flags)
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);
        if diagnostics {
            create_info = create_info.push_next(&mut instance_messenger_info);
        }

        // SAFETY: every pointer in create_info outlives this call.
        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let messenger = if diagnostics {
            let debug_utils = DebugUtils::new(entry, &instance);
            // SAFETY: instance is live and was created with the debug utils extension.
            match unsafe { debug_utils.create_debug_utils_messenger(&messenger_create_info(), None) } {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(result) => {
                    // SAFETY: nothing has been created from the instance yet.
                    unsafe { instance.destroy_instance(None) };
                    return Err(VulkanError::Api(result));
                }
            }
        } else {
            None
        };

        log::info!(
            "Created Vulkan instance (API {}.{}, {} extensions, {} layers)",
            application.api_version.0,
            application.api_version.1,
            extensions.len(),
            enabled_layers.len()
        );

        Ok(DriverInstance {
            entry: entry.clone(),
            instance,
            messenger,
            extensions,
        })
    }
}

/// Initialized connection to the graphics driver
///
/// Everything created from the instance must be destroyed before it.
pub struct DriverInstance {
    entry: Entry,
    instance: Instance,
    messenger: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    extensions: Vec<String>,
}

impl DriverInstance {
    /// Vulkan entry point table
    pub const fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Instance function table
    pub const fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Enabled instance extensions
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether `name` was enabled at creation
    pub fn has_extension(&self, name: &CStr) -> bool {
        name.to_str()
            .is_ok_and(|name| self.extensions.iter().any(|enabled| enabled == name))
    }

    /// Whether a diagnostic messenger is attached
    pub const fn diagnostics_enabled(&self) -> bool {
        self.messenger.is_some()
    }
}

impl Drop for DriverInstance {
    fn drop(&mut self) {
        // SAFETY: owners of child objects are dropped before the instance.
        unsafe {
            if let Some((debug_utils, messenger)) = self.messenger.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        log::info!("Vulkan instance destroyed");
    }
}
