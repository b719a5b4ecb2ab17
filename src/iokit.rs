//! The real port over the system frameworks.
//!
//! The IOKit and CoreFoundation frameworks are opened at runtime with
//! `libloading` and the handful of symbols the controller needs are
//! resolved once. Nothing is linked at build time, so the crate builds on
//! any host; the frameworks are only required when a native port is
//! actually loaded.

use crate::error::ControllerError;
use crate::port::{ConnectionHandle, IoPort, OsStatus, ServiceHandle};

use libloading::Library;
use std::ffi::{CStr, c_char, c_void};
use std::ptr;

const IOKIT_PATH: &str = "/System/Library/Frameworks/IOKit.framework/IOKit";
const CORE_FOUNDATION_PATH: &str =
    "/System/Library/Frameworks/CoreFoundation.framework/CoreFoundation";

// Mach/IOKit ABI types. Registry objects, iterators and connections are all
// mach port names on the wire.
type MachPort = u32;
type IoObject = u32;
type KernReturn = i32;
type CfRef = *const c_void;

const KERN_SUCCESS: KernReturn = 0;
// Port 0 selects the default master port.
const MASTER_PORT_DEFAULT: MachPort = 0;
// Connection type passed to the open call; the driver accepts type 0.
const CONNECTION_TYPE: u32 = 0;
const CF_STRING_ENCODING_UTF8: u32 = 0x0800_0100;
// kIOReturnError, reported when CoreFoundation refuses the key string.
const IO_RETURN_ERROR: KernReturn = 0xE00002BC_u32 as i32;

type ServiceMatchingFn = unsafe extern "C" fn(*const c_char) -> CfRef;
type GetMatchingServiceFn = unsafe extern "C" fn(MachPort, CfRef) -> IoObject;
type GetMatchingServicesFn = unsafe extern "C" fn(MachPort, CfRef, *mut IoObject) -> KernReturn;
type IteratorNextFn = unsafe extern "C" fn(IoObject) -> IoObject;
type ObjectReleaseFn = unsafe extern "C" fn(IoObject) -> KernReturn;
type ServiceOpenFn = unsafe extern "C" fn(IoObject, MachPort, u32, *mut IoObject) -> KernReturn;
type ServiceCloseFn = unsafe extern "C" fn(IoObject) -> KernReturn;
type ConnectCallScalarFn =
    unsafe extern "C" fn(IoObject, u32, *const u64, u32, *mut u64, *mut u32) -> KernReturn;
type DisplayGetFloatFn = unsafe extern "C" fn(IoObject, u32, CfRef, *mut f32) -> KernReturn;
type DisplaySetFloatFn = unsafe extern "C" fn(IoObject, u32, CfRef, f32) -> KernReturn;
type StringCreateFn = unsafe extern "C" fn(CfRef, *const c_char, u32) -> CfRef;
type CfReleaseFn = unsafe extern "C" fn(CfRef);

struct Api {
    service_matching: ServiceMatchingFn,
    get_matching_service: GetMatchingServiceFn,
    get_matching_services: GetMatchingServicesFn,
    iterator_next: IteratorNextFn,
    object_release: ObjectReleaseFn,
    service_open: ServiceOpenFn,
    service_close: ServiceCloseFn,
    connect_call_scalar: ConnectCallScalarFn,
    display_get_float: DisplayGetFloatFn,
    display_set_float: DisplaySetFloatFn,
    string_create: StringCreateFn,
    cf_release: CfReleaseFn,
}

/// [`IoPort`] implementation over the live IOKit and CoreFoundation
/// frameworks.
pub struct IoKitPort {
    api: Api,
    task_self: MachPort,
    // Keep the frameworks mapped for as long as the resolved function
    // pointers in `api` are callable.
    _iokit: Library,
    _core_foundation: Library,
}

impl IoKitPort {
    /// Load the system frameworks and resolve the driver-interface symbols.
    ///
    /// # Errors
    ///
    /// [`ControllerError::FrameworkLoad`] if a framework cannot be opened
    /// or a required symbol is missing.
    pub fn load() -> Result<Self, ControllerError> {
        unsafe {
            let iokit = Library::new(IOKIT_PATH)?;
            let core_foundation = Library::new(CORE_FOUNDATION_PATH)?;

            let api = Api {
                service_matching: *iokit.get(b"IOServiceMatching\0")?,
                get_matching_service: *iokit.get(b"IOServiceGetMatchingService\0")?,
                get_matching_services: *iokit.get(b"IOServiceGetMatchingServices\0")?,
                iterator_next: *iokit.get(b"IOIteratorNext\0")?,
                object_release: *iokit.get(b"IOObjectRelease\0")?,
                service_open: *iokit.get(b"IOServiceOpen\0")?,
                service_close: *iokit.get(b"IOServiceClose\0")?,
                connect_call_scalar: *iokit.get(b"IOConnectCallScalarMethod\0")?,
                display_get_float: *iokit.get(b"IODisplayGetFloatParameter\0")?,
                display_set_float: *iokit.get(b"IODisplaySetFloatParameter\0")?,
                string_create: *core_foundation.get(b"CFStringCreateWithCString\0")?,
                cf_release: *core_foundation.get(b"CFRelease\0")?,
            };

            // The calling task's port is exported as data, not a function.
            let task_self: *mut MachPort = *iokit.get(b"mach_task_self_\0")?;

            Ok(Self {
                api,
                task_self: *task_self,
                _iokit: iokit,
                _core_foundation: core_foundation,
            })
        }
    }
}

impl IoPort for IoKitPort {
    fn find_service(&self, class: &CStr) -> Option<ServiceHandle> {
        let service = unsafe {
            let matching = (self.api.service_matching)(class.as_ptr());
            if matching.is_null() {
                return None;
            }
            // The matching dictionary is consumed by the lookup.
            (self.api.get_matching_service)(MASTER_PORT_DEFAULT, matching)
        };

        (service != 0).then_some(service)
    }

    fn find_services(&self, class: &CStr) -> Result<Vec<ServiceHandle>, OsStatus> {
        let mut iterator: IoObject = 0;
        let status = unsafe {
            let matching = (self.api.service_matching)(class.as_ptr());
            if matching.is_null() {
                return Err(IO_RETURN_ERROR);
            }
            (self.api.get_matching_services)(MASTER_PORT_DEFAULT, matching, &mut iterator)
        };

        if status != KERN_SUCCESS {
            return Err(status);
        }

        let mut services = Vec::new();
        unsafe {
            loop {
                let service = (self.api.iterator_next)(iterator);
                if service == 0 {
                    break;
                }
                services.push(service);
            }
            (self.api.object_release)(iterator);
        }

        Ok(services)
    }

    fn open(&self, service: ServiceHandle) -> Result<ConnectionHandle, OsStatus> {
        let mut connection: IoObject = 0;
        let status = unsafe {
            (self.api.service_open)(service, self.task_self, CONNECTION_TYPE, &mut connection)
        };

        if status == KERN_SUCCESS {
            Ok(connection)
        } else {
            Err(status)
        }
    }

    fn close(&self, connection: ConnectionHandle) {
        unsafe {
            (self.api.service_close)(connection);
        }
    }

    fn release(&self, service: ServiceHandle) {
        unsafe {
            (self.api.object_release)(service);
        }
    }

    fn float_parameter(
        &self,
        service: ServiceHandle,
        index: u32,
        key: &CStr,
    ) -> Result<f32, OsStatus> {
        let mut value: f32 = 0.0;
        let status = unsafe {
            let key = (self.api.string_create)(ptr::null(), key.as_ptr(), CF_STRING_ENCODING_UTF8);
            if key.is_null() {
                return Err(IO_RETURN_ERROR);
            }
            let status = (self.api.display_get_float)(service, index, key, &mut value);
            (self.api.cf_release)(key);
            status
        };

        if status == KERN_SUCCESS {
            Ok(value)
        } else {
            Err(status)
        }
    }

    fn set_float_parameter(
        &self,
        service: ServiceHandle,
        index: u32,
        key: &CStr,
        value: f32,
    ) -> Result<(), OsStatus> {
        let status = unsafe {
            let key = (self.api.string_create)(ptr::null(), key.as_ptr(), CF_STRING_ENCODING_UTF8);
            if key.is_null() {
                return Err(IO_RETURN_ERROR);
            }
            let status = (self.api.display_set_float)(service, index, key, value);
            (self.api.cf_release)(key);
            status
        };

        if status == KERN_SUCCESS {
            Ok(())
        } else {
            Err(status)
        }
    }

    fn call_scalar(
        &self,
        connection: ConnectionHandle,
        selector: u32,
        inputs: &[u64],
        output_count: u32,
    ) -> Result<Vec<u64>, OsStatus> {
        let mut outputs = vec![0u64; output_count as usize];
        let mut produced = output_count;

        let status = unsafe {
            (self.api.connect_call_scalar)(
                connection,
                selector,
                inputs.as_ptr(),
                inputs.len() as u32,
                outputs.as_mut_ptr(),
                &mut produced,
            )
        };

        if status != KERN_SUCCESS {
            return Err(status);
        }

        outputs.truncate(produced as usize);
        Ok(outputs)
    }
}
