// Buffer utilities
//
// Host-visible buffers for vertex data uploaded once at startup.

use anyhow::{Context, Result};
use ash::vk;

/// Index of the first memory type allowed by `type_filter` that has all of `flags`
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&i| {
        let has_type = (type_filter & (1 << i)) != 0;
        let has_properties = memory_properties.memory_types[i as usize]
            .property_flags
            .contains(flags);
        has_type && has_properties
    })
}

/// Helper to create a buffer with specified usage and memory properties
pub fn create_buffer(
    device: &ash::Device,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    flags: vk::MemoryPropertyFlags,
) -> Result<(vk::Buffer, vk::DeviceMemory)> {
    let buffer_info = vk::BufferCreateInfo::builder()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = unsafe { device.create_buffer(&buffer_info, None) }
        .context("Failed to create buffer")?;

    let allocate = || -> Result<vk::DeviceMemory> {
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type_index =
            find_memory_type(memory_properties, requirements.memory_type_bits, flags)
                .context("Failed to find suitable memory type")?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe { device.allocate_memory(&alloc_info, None) }
            .context("Failed to allocate buffer memory")?;

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe { device.free_memory(memory, None) };
            return Err(e).context("Failed to bind buffer memory");
        }
        Ok(memory)
    };

    match allocate() {
        Ok(memory) => Ok((buffer, memory)),
        Err(e) => {
            unsafe { device.destroy_buffer(buffer, None) };
            Err(e)
        }
    }
}

/// Vertex data living in host-visible memory
#[derive(Debug)]
pub struct VertexBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub vertex_count: u32,
}

impl VertexBuffer {
    /// Create a buffer and fill it with `vertices`
    pub fn new<T: Copy>(
        device: &ash::Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        vertices: &[T],
    ) -> Result<Self> {
        let size = std::mem::size_of_val(vertices) as vk::DeviceSize;
        anyhow::ensure!(size > 0, "Vertex buffer would be empty");

        let (buffer, memory) = create_buffer(
            device,
            memory_properties,
            size,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        let vertex_buffer = Self {
            buffer,
            memory,
            vertex_count: vertices.len() as u32,
        };

        // Coherent memory: no flush needed after the copy
        let mapped = unsafe { device.map_memory(memory, 0, size, vk::MemoryMapFlags::empty()) };
        match mapped {
            Ok(ptr) => unsafe {
                (ptr as *mut T).copy_from_nonoverlapping(vertices.as_ptr(), vertices.len());
                device.unmap_memory(memory);
            },
            Err(e) => {
                vertex_buffer.destroy(device);
                return Err(e).context("Failed to map vertex buffer memory");
            }
        }

        log::debug!("Uploaded {} vertices ({} bytes)", vertices.len(), size);
        Ok(vertex_buffer)
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_buffer(self.buffer, None);
            device.free_memory(self.memory, None);
        }
    }
}
