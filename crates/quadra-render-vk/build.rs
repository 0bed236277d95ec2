use std::{env, fs, path::PathBuf};

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Vertex shader: no vertex input. The quad is a fan of four triangles
    // around its centre, generated from gl_VertexIndex (12 vertices).
    // Winding is clockwise in framebuffer space to match the pipeline's
    // front face.
    //   - set 0, binding 0: prerotation matrix (UBO)
    //   - push constant: HSV factors, forwarded flat to the fragment stage
    let vs_src = r#"
#version 450
layout(set = 0, binding = 0) uniform Transform { mat4 mvp; } u;
layout(push_constant) uniform Hsv { vec3 factors; } pc;

layout(location = 0) out vec2 vUv;
layout(location = 1) flat out vec3 vHsv;

const float S = 0.5;
const vec2 C  = vec2(0.0, 0.0);
const vec2 TL = vec2(-S, -S);
const vec2 TR = vec2( S, -S);
const vec2 BR = vec2( S,  S);
const vec2 BL = vec2(-S,  S);

const vec2 POS[12] = vec2[](
    C, TL, TR,
    C, TR, BR,
    C, BR, BL,
    C, BL, TL
);

void main() {
    vec2 p = POS[gl_VertexIndex];
    vUv = p / (2.0 * S) + 0.5;
    vHsv = pc.factors;
    gl_Position = u.mvp * vec4(p, 0.0, 1.0);
}
"#;

    // Fragment shader: sample the texture and apply the HSV adjustment.
    // 0.5 on every channel leaves the texel unchanged.
    let fs_src = r#"
#version 450
layout(set = 0, binding = 1) uniform sampler2D tex;

layout(location = 0) in vec2 vUv;
layout(location = 1) flat in vec3 vHsv;
layout(location = 0) out vec4 outColor;

vec3 rgb2hsv(vec3 c) {
    vec4 K = vec4(0.0, -1.0 / 3.0, 2.0 / 3.0, -1.0);
    vec4 p = mix(vec4(c.bg, K.wz), vec4(c.gb, K.xy), step(c.b, c.g));
    vec4 q = mix(vec4(p.xyw, c.r), vec4(c.r, p.yzx), step(p.x, c.r));
    float d = q.x - min(q.w, q.y);
    float e = 1.0e-10;
    return vec3(abs(q.z + (q.w - q.y) / (6.0 * d + e)), d / (q.x + e), q.x);
}

vec3 hsv2rgb(vec3 c) {
    vec4 K = vec4(1.0, 2.0 / 3.0, 1.0 / 3.0, 3.0);
    vec3 p = abs(fract(c.xxx + K.xyz) * 6.0 - K.www);
    return c.z * mix(K.xxx, clamp(p - K.xxx, 0.0, 1.0), c.y);
}

void main() {
    vec4 texel = texture(tex, vUv);
    vec3 hsv = rgb2hsv(texel.rgb);
    hsv.x = fract(hsv.x + vHsv.x - 0.5);
    hsv.y = clamp(hsv.y * vHsv.y * 2.0, 0.0, 1.0);
    hsv.z = clamp(hsv.z * vHsv.z * 2.0, 0.0, 1.0);
    outColor = vec4(hsv2rgb(hsv), texel.a);
}
"#;

    let comp = shaderc::Compiler::new().unwrap();
    let mut opts = shaderc::CompileOptions::new().unwrap();

    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let vs_spv = comp
        .compile_into_spirv(
            vs_src,
            shaderc::ShaderKind::Vertex,
            "shader.vert",
            "main",
            Some(&opts),
        )
        .unwrap();

    let fs_spv = comp
        .compile_into_spirv(
            fs_src,
            shaderc::ShaderKind::Fragment,
            "shader.frag",
            "main",
            Some(&opts),
        )
        .unwrap();

    fs::write(out.join("shader.vert.spv"), vs_spv.as_binary_u8()).unwrap();
    fs::write(out.join("shader.frag.spv"), fs_spv.as_binary_u8()).unwrap();

    println!("cargo:rerun-if-changed=build.rs");
}
