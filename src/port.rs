//! The seam between the controller and the OS driver interfaces.

use std::ffi::CStr;

/// Opaque registry handle for a matched driver service.
pub type ServiceHandle = u32;

/// Opaque handle for an open user-client connection.
///
/// Zero means "not connected"; a successfully opened connection is always
/// non-zero.
pub type ConnectionHandle = u32;

/// Raw OS status code of a driver call. Zero is success.
pub type OsStatus = i32;

/// Low-level OS collaborators used by [`Controller`](crate::Controller).
///
/// Covers the three concerns of the driver interface: service registry
/// lookup, display float parameters, and scalar method calls on an open
/// user-client connection. [`IoKitPort`](crate::IoKitPort) talks to the real
/// frameworks; [`MockPort`](crate::MockPort) substitutes for it in tests.
pub trait IoPort {
    /// Look up the single registered service matching a class name.
    ///
    /// Returns `None` when no such service is registered. The returned
    /// handle must be passed to [`IoPort::release`] when done.
    fn find_service(&self, class: &CStr) -> Option<ServiceHandle>;

    /// Look up every registered service matching a class name.
    ///
    /// `Err` carries the status code when the registry lookup itself fails.
    /// Every returned handle must be passed to [`IoPort::release`].
    fn find_services(&self, class: &CStr) -> Result<Vec<ServiceHandle>, OsStatus>;

    /// Open a privileged user-client connection to a service.
    fn open(&self, service: ServiceHandle) -> Result<ConnectionHandle, OsStatus>;

    /// Close a connection obtained from [`IoPort::open`].
    fn close(&self, connection: ConnectionHandle);

    /// Release a registry handle.
    fn release(&self, service: ServiceHandle);

    /// Read a float parameter from a display service.
    fn float_parameter(
        &self,
        service: ServiceHandle,
        index: u32,
        key: &CStr,
    ) -> Result<f32, OsStatus>;

    /// Write a float parameter on a display service.
    fn set_float_parameter(
        &self,
        service: ServiceHandle,
        index: u32,
        key: &CStr,
        value: f32,
    ) -> Result<(), OsStatus>;

    /// Invoke a numbered method on an open connection with 64-bit scalar
    /// inputs, expecting at most `output_count` 64-bit scalar outputs.
    fn call_scalar(
        &self,
        connection: ConnectionHandle,
        selector: u32,
        inputs: &[u64],
        output_count: u32,
    ) -> Result<Vec<u64>, OsStatus>;
}
