use brainpatch::factory::Modality;
use brainpatch::geometry::Shape4;

/// 解析形如`1,32,32,32`的四维形状，各分量必须为正整数。
pub fn shape4(s: &str) -> Result<Shape4, &'static str> {
    const ERR: &str = "形状格式错误，应为4个以逗号分隔的正整数";
    let dims = s
        .split(',')
        .map(|d| d.trim().parse::<usize>().map_err(|_| ERR))
        .collect::<Result<Vec<_>, _>>()?;
    match dims[..] {
        [c, z, y, x] if dims.iter().all(|&d| d > 0) => Ok([c, z, y, x]),
        _ => Err(ERR),
    }
}

/// 解析单个模态名，忽略大小写。
pub fn modality(s: &str) -> Result<Modality, String> {
    s.trim().parse::<Modality>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_parsing() {
        assert_eq!(shape4("1, 32,32,32"), Ok([1, 32, 32, 32]));
        assert!(shape4("1,32,32").is_err());
        assert!(shape4("1,0,32,32").is_err());
        assert!(shape4("a,b,c,d").is_err());
    }

    #[test]
    fn modality_parsing() {
        assert_eq!(modality(" t2_flair"), Ok(Modality::T2Flair));
        assert!(modality("PD").is_err());
    }
}
